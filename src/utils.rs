use std::path::{Component, Path, PathBuf};

use crate::XdvdfsError;

pub trait EntryPath {
    fn entry_path(&self, name: &str) -> Result<PathBuf, XdvdfsError>;
}

impl EntryPath for Path {
    /// Join a directory entry name onto this directory. Names come from a
    /// damaged disc, so anything but a single plain file name is refused.
    fn entry_path(&self, name: &str) -> Result<PathBuf, XdvdfsError> {
        let unusable = || XdvdfsError::InvalidPath(format!("Unusable entry name: {:?}", name));

        if name.contains(['/', '\\', '\0']) {
            return Err(unusable());
        }

        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(file_name)), None) => Ok(self.join(file_name)),
            _ => Err(unusable()),
        }
    }
}
