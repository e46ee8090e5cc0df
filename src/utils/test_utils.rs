//! Test utilities for building modules and functions.
