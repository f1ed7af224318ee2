//! Error classification and recovery tests.

mod classify_test;
mod recovery_test;
