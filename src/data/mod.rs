pub mod buffer_window;
