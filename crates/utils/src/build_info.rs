/// Git metadata captured by the build script, absent when building outside a checkout.
pub(crate) struct BuildInfo {
    pub(crate) commit_sha1: Option<&'static str>,
    pub(crate) git_dirty: Option<&'static str>,
}

pub(crate) const BUILD_INFO: BuildInfo = BuildInfo {
    commit_sha1: option_env!("VERGEN_GIT_SHA"),
    git_dirty: option_env!("VERGEN_GIT_DIRTY"),
};
