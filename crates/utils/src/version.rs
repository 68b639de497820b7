use std::sync::LazyLock;

use crate::build_info::BUILD_INFO;

/// Defines the application version.
pub static VERSION: LazyLock<String> = LazyLock::new(|| {
    format_version(
        env!("IMAGE_VERSION"),
        BUILD_INFO.commit_sha1,
        is_dirty(BUILD_INFO.git_dirty),
    )
});

fn is_dirty(git_dirty: Option<&str>) -> bool {
    git_dirty == Some("true")
}

fn format_version(image_version: &str, commit_sha1: Option<&str>, dirty: bool) -> String {
    format!(
        "{}-{}{}",
        image_version,
        commit_sha1.unwrap_or("unknown"),
        if dirty { "-dirty" } else { "" }
    )
}
