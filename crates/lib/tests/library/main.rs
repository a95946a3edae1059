mod common;
mod scripts_tests;
mod wrappers_tests;
