//! Tag and naming conventions for cluster resources

/// Tag key marking the owning cluster
pub const TAG_CLUSTER_NAME: &str = "KubernetesCluster";

/// Tag key marking the instance group a server belongs to
pub const TAG_INSTANCE_GROUP: &str = "instance-group";

/// Tag key marking the role of a server (control-plane, node, ...)
pub const TAG_ROLE: &str = "role";

/// `KubernetesCluster=<cluster>`
pub fn cluster_tag(cluster: &str) -> String {
    format!("{}={}", TAG_CLUSTER_NAME, cluster)
}

pub fn instance_group_tag(group: &str) -> String {
    format!("{}={}", TAG_INSTANCE_GROUP, group)
}

/// Name of the API load balancer of a cluster
pub fn load_balancer_name(cluster: &str) -> String {
    format!("api-{}", cluster.replace('.', "-"))
}

/// Value of `key` in a list of `key=value` tags
pub fn tag_value<'a>(tags: &'a [String], key: &str) -> Option<&'a str> {
    tags.iter().find_map(|tag| {
        tag.split_once('=')
            .filter(|(k, _)| *k == key)
            .map(|(_, v)| v)
    })
}
