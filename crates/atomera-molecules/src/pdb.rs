//! FASTA and PDB text helpers.

use atomera_common::{AtomeraError, Result};

/// Chain sequence read from the CA records of a PDB file.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainSequence {
    pub chain: char,
    pub sequence: String,
}

/// Parse a single-record FASTA file into `(header, sequence)`.
pub fn parse_fasta(text: &str) -> Result<(String, String)> {
    let mut header = String::new();
    let mut sequence = String::new();
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if let Some(h) = line.strip_prefix('>') {
            if !header.is_empty() || !sequence.is_empty() {
                break;
            }
            header = h.trim().to_string();
        } else {
            sequence.push_str(line);
        }
    }
    let sequence = sequence.to_ascii_uppercase();
    validate_sequence(&sequence)?;
    Ok((header, sequence))
}

/// Reject empty sequences and anything outside the amino-acid alphabet.
pub fn validate_sequence(sequence: &str) -> Result<()> {
    if sequence.is_empty() {
        return Err(AtomeraError::Structure("empty protein sequence".to_string()));
    }
    if let Some(bad) = sequence.chars().find(|c| !"ACDEFGHIKLMNPQRSTVWYXBZUO".contains(*c)) {
        return Err(AtomeraError::Structure(format!("invalid residue '{}' in sequence", bad)));
    }
    Ok(())
}

/// Sequences of every chain, in file order.
pub fn chain_sequences(pdb_text: &str) -> Result<Vec<ChainSequence>> {
    let mut chains: Vec<ChainSequence> = Vec::new();
    let mut last: Option<(char, String)> = None;

    for line in pdb_text.lines() {
        if line.starts_with("ENDMDL") {
            break;
        }
        if !line.starts_with("ATOM") || line.len() < 26 {
            continue;
        }
        if line.get(12..16).map(str::trim) != Some("CA") {
            continue;
        }
        let res_name = line.get(17..20).map(str::trim).unwrap_or_default();
        let chain = line.get(21..22).and_then(|c| c.chars().next()).unwrap_or(' ');
        let res_seq = line.get(22..27).map(str::trim).unwrap_or_default().to_string();

        let key = (chain, res_seq);
        if last.as_ref() == Some(&key) {
            continue;
        }
        last = Some(key);

        let code = three_to_one(res_name);
        match chains.last_mut() {
            Some(current) if current.chain == chain => current.sequence.push(code),
            _ => chains.push(ChainSequence { chain, sequence: code.to_string() }),
        }
    }

    if chains.is_empty() {
        return Err(AtomeraError::Structure("no CA atoms found".to_string()));
    }
    Ok(chains)
}

fn three_to_one(res_name: &str) -> char {
    match res_name {
        "ALA" => 'A', "ARG" => 'R', "ASN" => 'N', "ASP" => 'D', "CYS" => 'C',
        "GLN" => 'Q', "GLU" => 'E', "GLY" => 'G', "HIS" => 'H', "ILE" => 'I',
        "LEU" => 'L', "LYS" => 'K', "MET" => 'M', "PHE" => 'F', "PRO" => 'P',
        "SER" => 'S', "THR" => 'T', "TRP" => 'W', "TYR" => 'Y', "VAL" => 'V',
        "SEC" => 'U', "PYL" => 'O', "MSE" => 'M',
        _ => 'X',
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CRAMBIN_HEAD: &str = "\
ATOM      1  N   THR A   1      17.047  14.099   3.625  1.00 13.79           N
ATOM      2  CA  THR A   1      16.967  12.784   4.338  1.00 10.80           C
ATOM      3  C   THR A   1      15.685  12.755   5.133  1.00  9.19           C
ATOM      8  CA  THR A   2      12.703  11.069   5.288  1.00  7.89           C
ATOM     15  CA  CYS A   3      11.291  14.564   5.419  1.00  6.12           C
ATOM     21  CA  GLY B   1       1.000   1.000   1.000  1.00  6.12           C
HETATM   99  CA  HOH A 100       0.000   0.000   0.000  1.00  0.00           O
";

    #[test]
    fn test_chain_sequences_from_ca_records() {
        let chains = chain_sequences(CRAMBIN_HEAD).unwrap();
        assert_eq!(
            chains,
            vec![
                ChainSequence { chain: 'A', sequence: "TTC".to_string() },
                ChainSequence { chain: 'B', sequence: "G".to_string() },
            ]
        );
    }

    #[test]
    fn test_pdb_without_atoms_is_rejected() {
        assert!(chain_sequences("HEADER    EMPTY\nEND\n").is_err());
    }

    #[test]
    fn test_fasta_parsing_and_validation() {
        let (header, seq) = parse_fasta(">sp|P01116|RASK_HUMAN\nmteyklvv\nVGAGG\n").unwrap();
        assert_eq!(header, "sp|P01116|RASK_HUMAN");
        assert_eq!(seq, "MTEYKLVVVGAGG");
        assert!(parse_fasta(">empty\n").is_err());
        assert!(parse_fasta(">bad\nMTE1K\n").is_err());
    }
}
