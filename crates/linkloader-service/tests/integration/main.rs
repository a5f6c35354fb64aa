mod concurrency;
mod element_loader;
mod utils;
