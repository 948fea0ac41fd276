//! Marker canonicalization.
//!
//! Raw lab labels arrive in Catalan, Spanish or English with assorted spellings.
//! A `CanonicalTable` maps each known variant to one standard name; a
//! `CategoryRules` set then assigns the clinical category by keyword. Both are
//! immutable once built, so one `Canonicalizer` can be shared across threads.

use std::collections::BTreeMap;
use std::path::Path;

use log::debug;

use crate::error::{ComparatorError, Result};
use crate::model::{CanonicalMarker, Category};

const BUILTIN_VARIANTS: &[(&str, &str)] = &[
    // renal
    ("Creatinina", "Creatinina"),
    ("Creatinine", "Creatinina"),
    ("Creatinina sèrica", "Creatinina"),
    ("Creatinina sérica", "Creatinina"),
    ("Creatinina en sangre", "Creatinina"),
    ("Urea", "Urea"),
    ("Urea en sangre", "Urea"),
    ("Urea sèrica", "Urea"),
    ("BUN", "Urea"),
    ("Filtrat glomerular", "Filtrado glomerular estimado"),
    ("Estimació filtrat glomerular", "Filtrado glomerular estimado"),
    ("Filtrado glomerular", "Filtrado glomerular estimado"),
    ("FGe", "Filtrado glomerular estimado"),
    ("eGFR", "Filtrado glomerular estimado"),
    ("Aclarament de creatinina", "Aclaramiento de creatinina"),
    ("Creatinine clearance", "Aclaramiento de creatinina"),
    // metabolism / lipids
    ("Glucosa", "Glucosa"),
    ("Glucose", "Glucosa"),
    ("Glucèmia", "Glucosa"),
    ("Glucemia", "Glucosa"),
    ("Hemoglobina glicada", "Hemoglobina glicada (HbA1c)"),
    ("Hemoglobina glicosilada", "Hemoglobina glicada (HbA1c)"),
    ("HbA1c", "Hemoglobina glicada (HbA1c)"),
    ("Colesterol", "Colesterol total"),
    ("Colesterol total", "Colesterol total"),
    ("Total cholesterol", "Colesterol total"),
    ("LDL", "Colesterol LDL"),
    ("Colesterol LDL", "Colesterol LDL"),
    ("LDL-colesterol", "Colesterol LDL"),
    ("LDL cholesterol", "Colesterol LDL"),
    ("HDL", "Colesterol HDL"),
    ("Colesterol HDL", "Colesterol HDL"),
    ("HDL-colesterol", "Colesterol HDL"),
    ("HDL cholesterol", "Colesterol HDL"),
    ("Triglicèrids", "Triglicéridos"),
    ("Triglicéridos", "Triglicéridos"),
    ("Triglycerides", "Triglicéridos"),
    ("Sodi", "Sodio"),
    ("Sodio", "Sodio"),
    ("Sodium", "Sodio"),
    ("Potassi", "Potasio"),
    ("Potasio", "Potasio"),
    ("Potassium", "Potasio"),
    ("Àcid úric", "Ácido úrico"),
    ("Acido urico", "Ácido úrico"),
    ("Uric acid", "Ácido úrico"),
    // hematology
    ("Hemoglobina", "Hemoglobina"),
    ("Hemoglobin", "Hemoglobina"),
    ("Hb", "Hemoglobina"),
    ("Hematòcrit", "Hematocrito"),
    ("Hematocrito", "Hematocrito"),
    ("Hematocrit", "Hematocrito"),
    ("Leucòcits", "Leucocitos"),
    ("Leucocitos", "Leucocitos"),
    ("Leukocytes", "Leucocitos"),
    ("WBC", "Leucocitos"),
    ("Plaquetes", "Plaquetas"),
    ("Plaquetas", "Plaquetas"),
    ("Platelets", "Plaquetas"),
    ("Ferritina", "Ferritina"),
    ("Ferritin", "Ferritina"),
    ("Transferrina", "Transferrina"),
    ("Transferrin", "Transferrina"),
    // urine
    ("Proteïnúria", "Proteinuria"),
    ("Proteinúria", "Proteinuria"),
    ("Proteinuria", "Proteinuria"),
    ("Densitat orina", "Densidad en orina"),
    ("Densidad urinaria", "Densidad en orina"),
    ("Urine specific gravity", "Densidad en orina"),
    ("Quocient proteïna/creatinina", "Cociente proteína/creatinina en orina"),
    ("Cociente proteína/creatinina", "Cociente proteína/creatinina en orina"),
];

/// Exact-match lookup from spelling variants to canonical marker names.
///
/// Every canonical name is also a key mapping to itself, so canonicalizing a
/// canonical name is a no-op.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalTable {
    entries: BTreeMap<String, String>,
}

impl CanonicalTable {
    pub fn new<I, K, V>(variants: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut entries = BTreeMap::new();
        for (variant, canonical) in variants {
            let variant = variant.as_ref().trim();
            let canonical = canonical.as_ref().trim();
            if variant.is_empty() || canonical.is_empty() {
                return Err(ComparatorError::InvalidTable(format!(
                    "empty variant or target in entry ({variant:?} -> {canonical:?})"
                )));
            }
            if let Some(previous) = entries.insert(variant.to_string(), canonical.to_string()) {
                if previous != canonical {
                    return Err(ComparatorError::InvalidTable(format!(
                        "variant {variant:?} maps to both {previous:?} and {canonical:?}"
                    )));
                }
            }
        }

        let targets: Vec<String> = entries.values().cloned().collect();
        for target in targets {
            match entries.get(&target) {
                Some(mapped) if mapped != &target => {
                    return Err(ComparatorError::InvalidTable(format!(
                        "canonical name {target:?} is itself remapped to {mapped:?}"
                    )));
                }
                Some(_) => {}
                None => {
                    entries.insert(target.clone(), target);
                }
            }
        }

        Ok(Self { entries })
    }

    /// Loads a `{"variant": "Canonical", ...}` JSON object.
    pub fn from_json_str(data: &str) -> Result<Self> {
        let raw: BTreeMap<String, String> = serde_json::from_str(data)
            .map_err(|err| ComparatorError::InvalidTable(err.to_string()))?;
        Self::new(raw)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|err| {
            ComparatorError::InvalidTable(format!("cannot read {}: {err}", path.display()))
        })?;
        Self::from_json_str(&data)
    }

    pub fn lookup(&self, raw_name: &str) -> Option<&str> {
        self.entries.get(raw_name.trim()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for CanonicalTable {
    fn default() -> Self {
        let mut entries = BTreeMap::new();
        for (variant, canonical) in BUILTIN_VARIANTS {
            entries.insert(variant.to_string(), canonical.to_string());
            entries.insert(canonical.to_string(), canonical.to_string());
        }
        Self { entries }
    }
}

/// Keyword sets per category, checked in priority order. First hit wins.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryRules {
    rules: Vec<(Category, Vec<String>)>,
}

impl CategoryRules {
    /// Keywords are matched case-insensitively as substrings. Categories are tried
    /// in the order given; anything unmatched is `Other`.
    pub fn new(rules: Vec<(Category, Vec<String>)>) -> Self {
        let rules = rules
            .into_iter()
            .map(|(category, keywords)| {
                (category, keywords.into_iter().map(|k| k.to_lowercase()).collect())
            })
            .collect();
        Self { rules }
    }

    pub fn categorize(&self, name: &str) -> Category {
        let lowered = name.to_lowercase();
        if lowered.is_empty() {
            return Category::Other;
        }
        self.rules
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| lowered.contains(k.as_str())))
            .map(|(category, _)| *category)
            .unwrap_or(Category::Other)
    }
}

impl Default for CategoryRules {
    fn default() -> Self {
        fn words(list: &[&str]) -> Vec<String> {
            list.iter().map(|w| w.to_string()).collect()
        }

        Self::new(vec![
            (
                Category::RenalFunction,
                words(&[
                    "creatinin", "urea", "bun", "filtrat glomerular", "filtrado glomerular",
                    "fge", "egfr", "aclarament", "aclaramiento", "clearance", "cistatina",
                ]),
            ),
            (
                Category::MetabolismLipids,
                words(&[
                    "glucosa", "glucose", "glucèmia", "glucemia", "hba1c", "glicada",
                    "glicosilada", "colesterol", "cholesterol", "ldl", "hdl", "triglic",
                    "triglyc", "sodi", "potas", "calci", "vitamina d", "úric", "uric",
                ]),
            ),
            (
                Category::Hematology,
                words(&[
                    "hemoglobin", "hematòcrit", "hematocrit", "hematíe", "hematies", "leuc",
                    "leuk", "wbc", "neutr", "linf", "limf", "plaquet", "platelet", "ferritin",
                    "ferro", "hierro", "transferrin", "reticul",
                ]),
            ),
            (
                Category::Urine,
                words(&[
                    "orina", "urin", "proteinuria", "proteinúria", "proteïnúria", "densitat",
                    "densidad", "specific gravity", "sediment",
                ]),
            ),
        ])
    }
}

/// Maps raw labels to canonical identities. Total over all string inputs.
#[derive(Debug, Clone, Default)]
pub struct Canonicalizer {
    table: CanonicalTable,
    rules: CategoryRules,
}

impl Canonicalizer {
    pub fn new(table: CanonicalTable, rules: CategoryRules) -> Self {
        debug!("canonicalizer ready with {} table entries", table.len());
        Self { table, rules }
    }

    pub fn with_table(table: CanonicalTable) -> Self {
        Self::new(table, CategoryRules::default())
    }

    pub fn canonical_name(&self, raw_name: &str) -> String {
        match self.table.lookup(raw_name) {
            Some(canonical) => canonical.to_string(),
            None => raw_name.trim().to_string(),
        }
    }

    pub fn canonicalize(&self, raw_name: &str) -> CanonicalMarker {
        let canonical_name = self.canonical_name(raw_name);
        let category = self.rules.categorize(&canonical_name);
        CanonicalMarker { canonical_name, category }
    }

    pub fn table(&self) -> &CanonicalTable {
        &self.table
    }
}
