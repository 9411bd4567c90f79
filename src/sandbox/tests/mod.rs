//! Unit tests for sandbox provisioning.
