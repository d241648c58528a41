use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    pub registry: String,
    pub repository: String,
    pub tag: String,
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.registry.is_empty() {
            write!(f, "{}:{}", self.repository, self.tag)
        } else {
            write!(f, "{}/{}:{}", self.registry, self.repository, self.tag)
        }
    }
}

impl ImageReference {
    /// Reference of an image living in a Harbor project: `<host>/<project>/<name>:<tag>`
    pub fn in_project(hostname: &str, project: &str, name: &str, tag: &str) -> Self {
        Self {
            registry: hostname.to_string(),
            repository: format!("{}/{}", project, name),
            tag: tag.to_string(),
        }
    }

    /// Builds a reference from a registry path prefix such as
    /// `registry.goharbor.io/harbor-ci/`. The first path segment is the
    /// registry, the rest (if any) is prepended to the image name.
    pub fn from_registry_path(path: &str, name: &str, tag: &str) -> Self {
        let path = path.trim_end_matches('/');
        let (registry, namespace) = match path.split_once('/') {
            Some((registry, namespace)) => (registry, namespace),
            None => (path, ""),
        };

        let repository = if namespace.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", namespace, name)
        };

        Self {
            registry: registry.to_string(),
            repository,
            tag: tag.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_project() {
        let reference = ImageReference::in_project("harbor.local", "smoketest", "nginx", "latest");
        assert_eq!(reference.registry, "harbor.local");
        assert_eq!(reference.repository, "smoketest/nginx");
        assert_eq!(reference.to_string(), "harbor.local/smoketest/nginx:latest");
    }

    #[test]
    fn test_from_registry_path_with_namespace() {
        let reference =
            ImageReference::from_registry_path("registry.goharbor.io/harbor-ci/", "nginx", "latest");
        assert_eq!(
            reference,
            ImageReference {
                registry: "registry.goharbor.io".to_string(),
                repository: "harbor-ci/nginx".to_string(),
                tag: "latest".to_string(),
            }
        );
        assert_eq!(
            reference.to_string(),
            "registry.goharbor.io/harbor-ci/nginx:latest"
        );
    }

    #[test]
    fn test_from_registry_path_registry_only() {
        let reference = ImageReference::from_registry_path("docker.io", "nginx", "1.25");
        assert_eq!(reference.to_string(), "docker.io/nginx:1.25");
    }

    #[test]
    fn test_from_empty_registry_path() {
        let reference = ImageReference::from_registry_path("", "nginx", "latest");
        assert_eq!(reference.registry, "");
        assert_eq!(reference.to_string(), "nginx:latest");
    }
}
