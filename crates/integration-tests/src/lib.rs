//! End-to-end tests for the Conduit gateway live under `tests/`
