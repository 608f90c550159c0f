//! Canned-reply lookup for known incident phrases.
//!
//! Tables are static after startup. Matching is substring-based over folded
//! text, first hit wins: tables in construction order, entries in insertion
//! order. A message's own container id is deliberately not consulted — any
//! table may answer a message from any container.

use crate::text::normalize;

/// Ordered keyword→reply table for one conversation container.
#[derive(Debug, Clone)]
pub struct ReplyTable {
    /// Container the table was written for (documentation; not a filter).
    pub container_id: String,
    /// `(keyword, reply)` pairs in insertion order.
    pub entries: Vec<(String, String)>,
}

impl ReplyTable {
    pub fn new(container_id: impl Into<String>) -> Self {
        Self {
            container_id: container_id.into(),
            entries: Vec::new(),
        }
    }

    /// Append a keyword→reply pair. Insertion order is match order.
    pub fn with_entry(mut self, keyword: impl Into<String>, reply: impl Into<String>) -> Self {
        self.entries.push((keyword.into(), reply.into()));
        self
    }
}

/// Static keyword responder over a fixed set of reply tables.
pub struct KeywordResponder {
    tables: Vec<ReplyTable>,
}

impl KeywordResponder {
    pub fn new(tables: Vec<ReplyTable>) -> Self {
        Self { tables }
    }

    /// Responder with no tables (never matches).
    pub fn empty() -> Self {
        Self { tables: Vec::new() }
    }

    /// Find the canned reply for the first keyword whose folded form is a
    /// substring of the folded input. Pure lookup, no side effects.
    pub fn find_reply(&self, raw_text: &str) -> Option<&str> {
        let folded = normalize(raw_text);
        for table in &self.tables {
            for (keyword, reply) in &table.entries {
                if folded.contains(&normalize(keyword)) {
                    return Some(reply);
                }
            }
        }
        None
    }
}

impl Default for KeywordResponder {
    fn default() -> Self {
        Self::new(default_tables())
    }
}

/// The production reply tables for the monitored operations groups.
pub fn default_tables() -> Vec<ReplyTable> {
    let escalate = "Se procederá a revisar al interno, por favor en paralelo escalarlo \
                    al equipo de GSOC para que nos indiquen los ID´s de las rutas.";
    let escalate_priority = "Se procederá a revisar al interno de manera prioritaria, por favor \
                             en paralelo escalarlo al equipo de GSOC para que nos indiquen los \
                             ID´s de las rutas.";

    vec![
        ReplyTable::new("573124138249-1633615578@g.us")
            .with_entry("caídas las ingestas", escalate)
            .with_entry("tenemos degradación", "Se procederá a revisar internamente.")
            .with_entry("pixelados", "Procederemos a revisarlo.")
            .with_entry("pixelaciones", "Procederemos a revisarlo.")
            .with_entry("afectación en", escalate)
            .with_entry("degradación de ingestas", escalate)
            .with_entry(
                "notamos el enlace intermitente",
                "Se procederá a revisar, por favor en paralelo escalarlo al equipo de GSOC \
                 para que nos indiquen los ID´s de las rutas.",
            )
            .with_entry(
                "favor de verificar",
                "Se procederá a revisar, un momento por favor mientras lo revisamos.",
            )
            .with_entry("pixelaciones en los", escalate_priority)
            .with_entry("sin trafico", escalate_priority)
            .with_entry("degradacíon", escalate),
        ReplyTable::new("573144117449-1420163618@g.us")
            .with_entry("viejo Hugo", "Ok enterado, procedere")
            .with_entry(
                "Buenos días compañeros cómo va todo",
                "Buen día todo en orden hasta el momento",
            )
            .with_entry(
                "afectación de servicio",
                "procederemos a revisarlo, un momento por favor",
            ),
    ]
}
