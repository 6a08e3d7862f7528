pub mod result_handlers;
