mod common;
mod trigger;
