//! Route paths and header names shared by handlers, routes and tests.

/// Prefix for JSON API routes.
pub const API_PREFIX: &str = "/api";

/// Public download link: `/d/{id}`.
pub const DOWNLOAD_PATH: &str = "/d";

/// Public preview link: `/f/{id}`.
pub const PREVIEW_PATH: &str = "/f";

/// Header carrying the authenticated owner id, set by the upstream auth layer.
pub const OWNER_HEADER: &str = "x-owner-id";

/// Room for multipart boundaries and text fields on top of the file limit.
pub const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Multipart field that carries the file bytes.
pub const FILE_FIELD: &str = "file";
