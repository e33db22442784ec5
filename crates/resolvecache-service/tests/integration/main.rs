mod e2e;
mod stores;
mod utils;
