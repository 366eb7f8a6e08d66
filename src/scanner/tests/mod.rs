mod helpers;
mod manager_tests;
