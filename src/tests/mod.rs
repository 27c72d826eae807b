pub mod fcb_tests;
