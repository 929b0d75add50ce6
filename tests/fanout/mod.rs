mod history_tests;
mod session_tests;
