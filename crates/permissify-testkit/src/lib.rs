//! # Permissify Testkit
//!
//! Testing utilities for Permissify.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: A backend with the default catalog plus helpers for users,
//!   groups, roles and grants
//! - **Generators**: Proptest strategies for property-based testing
//!
//! ## Property Testing
//!
//! Use the generators with proptest:
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use permissify_testkit::generators::GrantCase;
//!
//! proptest! {
//!     #[test]
//!     fn names_are_canonical(case: GrantCase) {
//!         prop_assert!(case.permission_name().contains('.'));
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! Quickly set up test scenarios:
//!
//! ```rust,no_run
//! use permissify_testkit::TestFixture;
//!
//! async fn scenario() {
//!     let fixture = TestFixture::new().await;
//!     let alice = fixture.user("alice").await;
//!     fixture.grant(&alice, "auth.view_group", None).await;
//!     assert!(fixture.has(&alice, "auth.view_group", None).await);
//! }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::TestFixture;
pub use generators::GrantCase;
