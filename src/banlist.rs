use super::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BanState {
    Clear,
    Banned { remaining: Duration },
    Expired,
}

/// ip → ban-start table. Only the accept path writes through `check` and
/// the periodic sweep through `purge`.
pub struct BanList {
    enabled: bool,
    ban_time: Duration,
    banned: DashMap<IpAddr, Instant>,
}

impl BanList {
    pub fn new(settings: &BanningSettings) -> Self {
        Self {
            enabled: settings.enabled,
            ban_time: Duration::from_secs(settings.time),
            banned: DashMap::new(),
        }
    }

    pub fn ban(&self, ip: IpAddr) {
        if self.enabled {
            self.banned.insert(ip, Instant::now());
        }
    }

    /// Looks up `ip`, removing the entry when the ban has lapsed.
    pub fn check(&self, ip: IpAddr) -> BanState {
        if !self.enabled {
            return BanState::Clear;
        }

        match self.banned.get(&ip) {
            None => return BanState::Clear,
            Some(entry) => {
                let elapsed = entry.elapsed();
                if elapsed < self.ban_time {
                    return BanState::Banned {
                        remaining: self.ban_time - elapsed,
                    };
                }
            }
        }

        // the shard guard is released; removal will not deadlock
        self.banned.remove(&ip);
        BanState::Expired
    }

    /// Drops entries older than the ban duration; returns how many fell off.
    pub fn purge(&self) -> usize {
        let before = self.banned.len();
        let ban_time = self.ban_time;
        self.banned.retain(|_, started| started.elapsed() < ban_time);
        before - self.banned.len()
    }

    pub fn len(&self) -> usize {
        self.banned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.banned.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(n: u8) -> IpAddr {
        format!("10.0.0.{n}").parse().unwrap()
    }

    fn ban_list(enabled: bool, time: u64) -> BanList {
        BanList::new(&BanningSettings {
            enabled,
            time,
            ..Default::default()
        })
    }

    #[test]
    fn unknown_ips_are_clear() {
        assert_eq!(ban_list(true, 600).check(ip(1)), BanState::Clear);
    }

    #[test]
    fn banned_ips_report_time_left() {
        let bans = ban_list(true, 600);
        bans.ban(ip(1));

        match bans.check(ip(1)) {
            BanState::Banned { remaining } => assert!(remaining <= Duration::from_secs(600)),
            state => panic!("expected a ban, got {state:?}"),
        }
    }

    #[test]
    fn expired_bans_are_forgiven_on_check() {
        let bans = ban_list(true, 0);
        bans.ban(ip(2));

        assert_eq!(bans.check(ip(2)), BanState::Expired);
        assert_eq!(bans.check(ip(2)), BanState::Clear, "entry was removed");
    }

    #[test]
    fn purge_drops_only_expired_entries() {
        let bans = ban_list(true, 0);
        bans.ban(ip(1));
        bans.ban(ip(2));
        assert_eq!(bans.len(), 2);
        assert_eq!(bans.purge(), 2);
        assert!(bans.is_empty());

        let keeps = ban_list(true, 600);
        keeps.ban(ip(3));
        assert_eq!(keeps.purge(), 0);
        assert_eq!(keeps.len(), 1);
    }

    #[test]
    fn disabled_banning_is_a_no_op() {
        let bans = ban_list(false, 600);
        bans.ban(ip(1));
        assert_eq!(bans.check(ip(1)), BanState::Clear);
        assert!(bans.is_empty());
    }
}
