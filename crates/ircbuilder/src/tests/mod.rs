//! Behavioural suites driven against a scripted chat server.

mod support;
