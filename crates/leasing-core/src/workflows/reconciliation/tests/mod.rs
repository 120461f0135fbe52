mod common;
mod comparator;
mod service;
