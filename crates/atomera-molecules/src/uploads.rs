//! Resolution of uploaded protein and ligand references.
//!
//! Uploads land in one directory:
//! - `<root>/<protein_id>.fasta` for a submitted sequence
//! - `<root>/<protein_id>_<filename>.pdb` (or `<protein_id>.pdb`) for an uploaded structure
//! - `<root>/<ligand_set_id>/` holding `input.smi` and/or one file per ligand

use atomera_jobs::StageFailure;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use crate::pdb;
use crate::process::io_failure;

const SMILES_FILE: &str = "input.smi";
const LIGAND_EXTENSIONS: &[&str] = &["sdf", "mol2", "pdbqt", "mol"];

#[derive(Debug, Clone, PartialEq)]
pub enum ProteinUpload {
    Sequence { header: String, sequence: String },
    Structure(PathBuf),
}

/// One ligand of an uploaded set.
#[derive(Debug, Clone, PartialEq)]
pub struct LigandEntry {
    pub id: String,
    pub smiles: Option<String>,
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct UploadLayout {
    root: PathBuf,
}

impl UploadLayout {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }

    pub async fn protein(&self, protein_id: &str) -> Result<ProteinUpload, StageFailure> {
        check_reference("protein", protein_id)?;

        let fasta = self.root.join(format!("{}.fasta", protein_id));
        if fs::try_exists(&fasta).await.unwrap_or(false) {
            let text = fs::read_to_string(&fasta)
                .await
                .map_err(|e| io_failure("reading protein sequence", e))?;
            let (header, sequence) = pdb::parse_fasta(&text)
                .map_err(|e| StageFailure::invalid_input(e.to_string()))?;
            debug!("Protein {} resolved to sequence of {} residues", protein_id, sequence.len());
            return Ok(ProteinUpload::Sequence { header, sequence });
        }

        let exact = self.root.join(format!("{}.pdb", protein_id));
        if fs::try_exists(&exact).await.unwrap_or(false) {
            return Ok(ProteinUpload::Structure(exact));
        }

        let prefix = format!("{}_", protein_id);
        let mut candidates = self
            .list(&self.root)
            .await?
            .into_iter()
            .filter(|p| {
                let name = p.file_name().and_then(|n| n.to_str()).unwrap_or_default();
                name.starts_with(&prefix) && has_extension(p, &["pdb"])
            })
            .collect::<Vec<_>>();
        candidates.sort();
        candidates
            .into_iter()
            .next()
            .map(ProteinUpload::Structure)
            .ok_or_else(|| StageFailure::invalid_input(format!("protein {} not found in uploads", protein_id)))
    }

    pub async fn ligands(&self, ligand_set_id: &str) -> Result<Vec<LigandEntry>, StageFailure> {
        check_reference("ligand set", ligand_set_id)?;
        let dir = self.root.join(ligand_set_id);
        if !fs::try_exists(&dir).await.unwrap_or(false) {
            return Err(StageFailure::invalid_input(format!("ligand set {} not found in uploads", ligand_set_id)));
        }

        let mut ligands = Vec::new();
        let smi = dir.join(SMILES_FILE);
        if fs::try_exists(&smi).await.unwrap_or(false) {
            let text = fs::read_to_string(&smi).await.map_err(|e| io_failure("reading SMILES list", e))?;
            ligands.extend(parse_smiles_list(&text));
        }

        let mut files = self
            .list(&dir)
            .await?
            .into_iter()
            .filter(|p| has_extension(p, LIGAND_EXTENSIONS))
            .collect::<Vec<_>>();
        files.sort();
        for file in files {
            let id = file.file_stem().and_then(|s| s.to_str()).unwrap_or("ligand").to_string();
            ligands.push(LigandEntry { id, smiles: None, file: Some(file) });
        }

        if ligands.is_empty() {
            return Err(StageFailure::invalid_input(format!("ligand set {} is empty", ligand_set_id)));
        }
        let mut seen = HashSet::with_capacity(ligands.len());
        if let Some(dup) = ligands.iter().find(|l| !seen.insert(l.id.as_str())) {
            return Err(StageFailure::invalid_input(format!(
                "ligand set {} has duplicate ligand id {}",
                ligand_set_id, dup.id
            )));
        }
        debug!("Ligand set {} resolved to {} ligands", ligand_set_id, ligands.len());
        Ok(ligands)
    }

    async fn list(&self, dir: &Path) -> Result<Vec<PathBuf>, StageFailure> {
        let mut entries = fs::read_dir(dir).await.map_err(|e| io_failure("listing uploads", e))?;
        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| io_failure("listing uploads", e))? {
            paths.push(entry.path());
        }
        Ok(paths)
    }
}

/// `input.smi`: one SMILES per line, optional name after whitespace, `#` comments.
pub fn parse_smiles_list(text: &str) -> Vec<LigandEntry> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .enumerate()
        .map(|(i, line)| {
            let mut parts = line.split_whitespace();
            let smiles = parts.next().unwrap_or_default().to_string();
            let id = parts.next().map(str::to_string).unwrap_or_else(|| format!("lig_{}", i + 1));
            LigandEntry { id, smiles: Some(smiles), file: None }
        })
        .collect()
}

fn check_reference(kind: &str, reference: &str) -> Result<(), StageFailure> {
    let valid = !reference.is_empty()
        && reference != "."
        && reference != ".."
        && !reference.contains(['/', '\\']);
    if valid {
        Ok(())
    } else {
        Err(StageFailure::invalid_input(format!("malformed {} reference: {:?}", kind, reference)))
    }
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| extensions.iter().any(|x| e.eq_ignore_ascii_case(x)))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use atomera_jobs::FailureCause;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_fasta_upload_resolves_to_sequence() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("p1.fasta"), ">KRAS\nMTEYKLVVVG\nAGGVGKSALT\n").unwrap();

        let layout = UploadLayout::new(dir.path());
        let upload = layout.protein("p1").await.unwrap();
        assert_eq!(
            upload,
            ProteinUpload::Sequence { header: "KRAS".to_string(), sequence: "MTEYKLVVVGAGGVGKSALT".to_string() }
        );
    }

    #[tokio::test]
    async fn test_pdb_upload_matched_by_prefix() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("p2_receptor.pdb"), "ATOM\n").unwrap();
        let layout = UploadLayout::new(dir.path());
        assert_eq!(
            layout.protein("p2").await.unwrap(),
            ProteinUpload::Structure(dir.path().join("p2_receptor.pdb"))
        );
    }

    #[tokio::test]
    async fn test_missing_or_malformed_protein_is_invalid_input() {
        let dir = tempdir().unwrap();
        let layout = UploadLayout::new(dir.path());
        assert_eq!(layout.protein("nope").await.unwrap_err().cause, FailureCause::InvalidInput);
        assert_eq!(layout.protein("../etc").await.unwrap_err().cause, FailureCause::InvalidInput);
    }

    #[tokio::test]
    async fn test_ligand_set_combines_smiles_and_files() {
        let dir = tempdir().unwrap();
        let set = dir.path().join("set1");
        std::fs::create_dir(&set).unwrap();
        std::fs::write(set.join("input.smi"), "CCO ethanol\n# comment\nc1ccccc1\n").unwrap();
        std::fs::write(set.join("aspirin.sdf"), "").unwrap();
        std::fs::write(set.join("notes.txt"), "").unwrap();

        let ligands = UploadLayout::new(dir.path()).ligands("set1").await.unwrap();
        let ids: Vec<_> = ligands.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["ethanol", "lig_2", "aspirin"]);
        assert_eq!(ligands[1].smiles.as_deref(), Some("c1ccccc1"));
        assert!(ligands[2].file.is_some());
    }

    #[tokio::test]
    async fn test_empty_ligand_set_rejected() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("empty")).unwrap();
        let err = UploadLayout::new(dir.path()).ligands("empty").await.unwrap_err();
        assert_eq!(err.to_string(), "invalid input: ligand set empty is empty");
    }

    #[tokio::test]
    async fn test_duplicate_ligand_ids_rejected() {
        let dir = tempdir().unwrap();
        let set = dir.path().join("dups");
        std::fs::create_dir(&set).unwrap();
        std::fs::write(set.join("input.smi"), "CCO aspirin
").unwrap();
        std::fs::write(set.join("aspirin.sdf"), "").unwrap();

        let err = UploadLayout::new(dir.path()).ligands("dups").await.unwrap_err();
        assert_eq!(err.cause, FailureCause::InvalidInput);
        assert!(err.to_string().contains("duplicate ligand id aspirin"));

        std::fs::write(set.join("input.smi"), "CCO lig_2
c1ccccc1
").unwrap();
        std::fs::remove_file(set.join("aspirin.sdf")).unwrap();
        let err = UploadLayout::new(dir.path()).ligands("dups").await.unwrap_err();
        assert!(err.to_string().contains("duplicate ligand id lig_2"));
    }
}
