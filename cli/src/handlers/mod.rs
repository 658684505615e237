mod export;
pub use export::handle_export;
