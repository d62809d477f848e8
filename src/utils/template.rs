//! String template rendering utilities.

use std::collections::HashMap;

pub struct TemplateVars;

impl TemplateVars {
    pub const SITE: &'static str = "site";
    pub const ENVIRONMENT: &'static str = "environment";
    pub const PROJECT_ROOT: &'static str = "projectRoot";
    pub const RELEASES_ROOT: &'static str = "releasesRoot";
    pub const SHARED_ROOT: &'static str = "sharedRoot";
    pub const REPOSITORY_ROOT: &'static str = "repositoryRoot";
    pub const RELEASE_NAME: &'static str = "releaseName";
    pub const RELEASE_PATH: &'static str = "releasePath";
    pub const TAG: &'static str = "tag";
}

pub fn render_map(template: &str, variables: &HashMap<String, String>) -> String {
    let mut result = template.to_string();

    for (key, value) in variables {
        let placeholder = format!("{{{{{}}}}}", key);
        result = result.replace(&placeholder, value);
    }

    result
}
