use super::*;

/// The active-job table. Templates stay answerable for late submits until
/// new work invalidates them or the retention bound retires the oldest.
pub struct Jobs {
    next_id: JobId,
    latest: Option<Arc<BlockTemplate>>,
    valid: LruCache<JobId, Arc<BlockTemplate>>,
}

impl Jobs {
    pub fn new() -> Self {
        Self {
            next_id: JobId::new(0),
            latest: None,
            valid: LruCache::new(NonZeroUsize::new(MAX_ACTIVE_JOBS).expect("bound is non-zero")),
        }
    }

    pub fn next_id(&mut self) -> JobId {
        let id = self.next_id;
        self.next_id = self.next_id.next();
        id
    }

    pub fn get(&mut self, id: &JobId) -> Option<Arc<BlockTemplate>> {
        self.valid.get(id).cloned()
    }

    pub fn latest(&self) -> Option<Arc<BlockTemplate>> {
        self.latest.clone()
    }

    /// Returns true when the template obsoletes everything before it — the
    /// `clean_jobs` signal of the resulting broadcast.
    pub fn insert(&mut self, template: Arc<BlockTemplate>) -> bool {
        let clean = self
            .latest
            .as_ref()
            .map(|prev| {
                prev.rpc_data.previous_block_hash != template.rpc_data.previous_block_hash
            })
            .unwrap_or(true);

        if clean {
            self.valid.clear();
        }

        self.latest = Some(template.clone());
        self.valid.put(template.job_id, template);
        clean
    }
}

impl Default for Jobs {
    fn default() -> Self {
        Self::new()
    }
}
