use buildsync_types::ClientError;

#[derive(Debug, Clone, PartialEq, Eq)]
/// `owner/name` pair parsed from a repository full name.
pub struct RepoName {
    pub owner: String,
    pub name: String,
}

impl RepoName {
    pub fn parse(full_name: &str) -> Result<Self, ClientError> {
        let trimmed = full_name.trim().trim_matches('/');
        let Some((owner, name)) = trimmed.split_once('/') else {
            return Err(ClientError::InvalidRequest(format!(
                "repository '{full_name}' must be in owner/name form"
            )));
        };
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return Err(ClientError::InvalidRequest(format!(
                "repository '{full_name}' must be in owner/name form"
            )));
        }
        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}
