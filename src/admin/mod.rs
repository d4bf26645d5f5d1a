use crate::gateway::PoolStats;

pub fn format_pool_stats(stats: &[PoolStats]) -> String {
    stats
        .iter()
        .map(|s| {
            let loads = s
                .loads
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(",");
            format!(
                "channel={} address={} connections={} sessions={} loads=[{loads}]",
                s.name, s.endpoint, s.connections, s.sessions
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
