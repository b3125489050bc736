pub const SALESCAST_VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn git_commit_hash() -> &'static str {
    salescast_rpc::GIT_COMMIT.unwrap_or("unknown")
}
