use std::io::Write;

use anyhow::Result;

use crate::application::{Snapshot, TrackerService};
use crate::domain::format_cents;

/// Exporter for converting one user's tracker data to CSV or JSON.
pub struct Exporter<'a> {
    service: &'a TrackerService,
}

impl<'a> Exporter<'a> {
    pub fn new(service: &'a TrackerService) -> Self {
        Self { service }
    }

    /// Export an owner's transactions to CSV. Returns the record count.
    pub async fn export_transazioni_csv<W: Write>(&self, owner: &str, writer: W) -> Result<usize> {
        let transazioni = self.service.list_transazioni(owner).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["id", "data", "titolo", "descrizione", "costo"])?;

        for t in &transazioni {
            csv_writer.write_record([
                t.id.to_string(),
                t.data.to_string(),
                t.titolo.clone(),
                t.descrizione.clone(),
                format_cents(t.costo),
            ])?;
        }

        csv_writer.flush()?;
        Ok(transazioni.len())
    }

    /// Export an owner's roster to CSV. Returns the record count.
    pub async fn export_friends_csv<W: Write>(&self, owner: &str, writer: W) -> Result<usize> {
        let friends = self.service.list_friends(owner).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["id", "nome", "cognome", "email", "score"])?;

        for f in &friends {
            csv_writer.write_record([
                f.id.to_string(),
                f.nome.clone(),
                f.cognome.clone(),
                f.email.clone(),
                f.score.to_string(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(friends.len())
    }

    /// Export everything belonging to an owner as pretty-printed JSON.
    pub async fn export_snapshot_json<W: Write>(&self, owner: &str, mut writer: W) -> Result<Snapshot> {
        let snapshot = self.service.snapshot(owner).await?;
        serde_json::to_writer_pretty(&mut writer, &snapshot)?;
        writeln!(writer)?;
        Ok(snapshot)
    }
}
