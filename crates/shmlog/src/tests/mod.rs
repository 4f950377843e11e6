mod helpers;

mod address_tests;
mod log_tests;
