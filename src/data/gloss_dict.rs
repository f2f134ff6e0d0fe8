// ============================================================
// Layer 4 — Gloss Dictionary
// ============================================================
// Maps gloss strings to class ids and back.
//
// On disk it is a JSON object { "GLOSS": id, ... }. Ids start
// at 1; class 0 is the CTC blank and has no gloss.
//
//   {"HELLO": 1, "WORLD": 2}  →  num_classes() == 3

use anyhow::{bail, ensure, Context, Result};
use std::{collections::HashMap, fs, path::Path};

#[derive(Debug, Clone, Default)]
pub struct GlossDict {
    to_id:   HashMap<String, usize>,
    /// Indexed by class id; slot 0 (blank) is empty
    to_gloss: Vec<Option<String>>,
}

impl GlossDict {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("Cannot read gloss dictionary '{}'", path.display()))?;
        let map: HashMap<String, usize> = serde_json::from_str(&json)
            .with_context(|| format!("Malformed gloss dictionary '{}'", path.display()))?;
        let dict = Self::from_map(map)?;
        ensure!(!dict.is_empty(), "Gloss dictionary '{}' has no glosses", path.display());
        tracing::info!("Loaded {} glosses from '{}'", dict.len(), path.display());
        Ok(dict)
    }

    pub fn from_map(map: HashMap<String, usize>) -> Result<Self> {
        let max_id = map.values().copied().max().unwrap_or(0);
        let mut to_gloss = vec![None; max_id + 1];
        for (gloss, &id) in &map {
            if id == 0 {
                bail!("Gloss '{gloss}' uses id 0, which is reserved for the blank");
            }
            if let Some(prev) = &to_gloss[id] {
                bail!("Glosses '{prev}' and '{gloss}' share id {id}");
            }
            to_gloss[id] = Some(gloss.clone());
        }
        Ok(Self { to_id: map, to_gloss })
    }

    /// Assign ids 1, 2, ... in iteration order
    pub fn from_glosses<I, S>(glosses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut dict = Self { to_id: HashMap::new(), to_gloss: vec![None] };
        for gloss in glosses {
            let gloss = gloss.into();
            if dict.to_id.contains_key(&gloss) {
                continue;
            }
            dict.to_id.insert(gloss.clone(), dict.to_gloss.len());
            dict.to_gloss.push(Some(gloss));
        }
        dict
    }

    pub fn gloss(&self, id: usize) -> Option<&str> {
        self.to_gloss.get(id).and_then(|g| g.as_deref())
    }

    pub fn id(&self, gloss: &str) -> Option<usize> {
        self.to_id.get(gloss).copied()
    }

    pub fn len(&self) -> usize {
        self.to_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.to_id.is_empty()
    }

    /// Output width of a classifier over this dictionary, blank included
    pub fn num_classes(&self) -> usize {
        self.to_gloss.len().max(1)
    }
}
