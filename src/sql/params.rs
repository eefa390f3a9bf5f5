use serde_json::Value;

/// Position in a [`ParamRegistry`] that can be rolled back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamCheckpoint {
    len: usize,
    next_id: usize,
}

/// Ordered named parameters.
///
/// Names handed out by [`ParamRegistry::bind`] are unique within one registry.
/// Deterministic names registered with [`ParamRegistry::bind_named`] must not
/// look like generated ones (`p<n>`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamRegistry {
    values: Vec<(String, Value)>,
    next_id: usize,
}

impl ParamRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a value under a freshly allocated name and return the name.
    pub fn bind(&mut self, value: Value) -> String {
        let name = loop {
            self.next_id += 1;
            let candidate = format!("p{}", self.next_id);
            if !self.contains(&candidate) {
                break candidate;
            }
        };
        self.values.push((name.clone(), value));
        name
    }

    /// Bind a value under a caller chosen name, replacing any previous value.
    pub fn bind_named(&mut self, name: impl Into<String>, value: Value) -> String {
        let name = name.into();
        match self.values.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.values.push((name.clone(), value)),
        }
        name
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Replace the value of an existing parameter. Returns `false` if the name is unknown.
    pub fn update_value(&mut self, name: &str, value: Value) -> bool {
        match self.values.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => {
                entry.1 = value;
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn checkpoint(&self) -> ParamCheckpoint {
        ParamCheckpoint {
            len: self.values.len(),
            next_id: self.next_id,
        }
    }

    /// Drop every parameter added after `checkpoint`.
    pub fn rollback_to(&mut self, checkpoint: ParamCheckpoint) {
        self.values.truncate(checkpoint.len);
        self.next_id = checkpoint.next_id;
    }
}
