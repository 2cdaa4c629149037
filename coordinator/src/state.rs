use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::Path,
};

use serde::{Deserialize, Serialize};

use crate::{error::Result, parameters::ParameterVector};

/// A consistent `(round, parameters)` pair of the shared model.
///
/// Instances are immutable once published, a merge builds a new one and swaps
/// it in, so a reader can never see a round paired with another round's parameters.
/// It doubles as the checkpoint format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalModelState {
    pub round: u64,
    pub parameters: ParameterVector,
}

impl GlobalModelState {
    /// Writes this state as JSON next to `path` and renames it into place.
    ///
    /// # Arguments
    /// * `path` - Where the checkpoint should end up.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let tmp = path.with_extension("tmp");

        let mut writer = BufWriter::new(File::create(&tmp)?);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush()?;
        drop(writer);

        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Reads a checkpoint written by `save`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = fs::read(path)?;
        Ok(serde_json::from_slice(&raw)?)
    }
}

#[cfg(test)]
mod tests {
    use std::{env, process};

    use super::*;

    #[test]
    fn save_then_load() {
        let path = env::temp_dir().join(format!("checkpoint-{}.json", process::id()));
        let state = GlobalModelState {
            round: 12,
            parameters: vec![0.1, -3.5, 8.].into(),
        };

        state.save(&path).unwrap();
        let loaded = GlobalModelState::load(&path).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(loaded, state);
        assert!(!path.with_extension("tmp").exists());
    }
}
