use crate::agents::Agent;
use anyhow::{Context, Result};
use log::{error, info};
use slime_common::FieldSnapshot;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Snapshot file formats the runner can write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotFormat {
    Json,
    Bincode,
    MessagePack,
}

impl SnapshotFormat {
    /// Parses the `output.format` setting, falling back to JSON for unknown names.
    pub fn from_config(name: Option<&str>) -> Self {
        match name.unwrap_or("json") {
            "json" => SnapshotFormat::Json,
            "bincode" => SnapshotFormat::Bincode,
            "messagepack" => SnapshotFormat::MessagePack,
            other => {
                error!("Unknown output format: {}. Using JSON instead.", other);
                SnapshotFormat::Json
            }
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            SnapshotFormat::Json => "json",
            SnapshotFormat::Bincode => "bin",
            SnapshotFormat::MessagePack => "msgpack",
        }
    }
}

/// Writes all snapshots to `<base>_snapshots.<ext>` and returns the path.
///
/// The bincode stream is a `u32` snapshot count followed by each snapshot, so
/// readers can decode it one record at a time.
pub fn save_snapshots(snapshots: &[FieldSnapshot], format: SnapshotFormat, base_filename: &str) -> Result<PathBuf> {
    let path = PathBuf::from(format!("{}_snapshots.{}", base_filename, format.extension()));
    let file = File::create(&path)
        .with_context(|| format!("Error creating snapshot file '{}'", path.display()))?;
    let mut writer = BufWriter::new(file);

    match format {
        SnapshotFormat::Json => {
            serde_json::to_writer(&mut writer, snapshots)
                .context("Error serializing snapshots to JSON")?;
        }
        SnapshotFormat::Bincode => {
            let count = u32::try_from(snapshots.len())
                .context("Too many snapshots for the bincode header")?;
            bincode::serialize_into(&mut writer, &count)
                .context("Error writing bincode snapshot count")?;
            for snapshot in snapshots {
                bincode::serialize_into(&mut writer, snapshot)
                    .context("Error serializing snapshot to bincode")?;
            }
        }
        SnapshotFormat::MessagePack => {
            rmp_serde::encode::write(&mut writer, snapshots)
                .context("Error serializing snapshots to MessagePack")?;
        }
    }
    writer.flush()?;
    info!("{} snapshots saved to {}", snapshots.len(), path.display());
    Ok(path)
}

/// Writes the agent list as CSV with one row per agent.
pub fn save_agents_csv<P: AsRef<Path>>(agents: &[Agent], path: P) -> Result<()> {
    let path = path.as_ref();
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Error creating CSV file '{}'", path.display()))?;
    writer.write_record(["x", "y", "heading", "species"])?;
    for agent in agents {
        writer.write_record(&[
            format!("{:.4}", agent.pos.x),
            format!("{:.4}", agent.pos.y),
            format!("{:.5}", agent.heading),
            agent.species.to_string(),
        ])?;
    }
    writer.flush()?;
    info!("Final agents saved to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use slime_common::ChannelLayout;
    use std::io::BufReader;

    fn snapshot(tick: u64) -> FieldSnapshot {
        FieldSnapshot {
            tick,
            time: tick as f32,
            width: 2,
            height: 1,
            species_count: 1,
            layout: ChannelLayout::Direct,
            cells: vec![[tick as u32, 0, 0, 0], [0, 0, 0, 0]],
            species_totals: vec![tick as f32],
            agents: None,
        }
    }

    fn temp_base(name: &str) -> String {
        std::env::temp_dir()
            .join(format!("slime_output_{}_{}", name, std::process::id()))
            .display()
            .to_string()
    }

    #[test]
    fn bincode_stream_has_a_count_header() {
        let base = temp_base("bincode");
        let path = save_snapshots(&[snapshot(1), snapshot(2)], SnapshotFormat::Bincode, &base).unwrap();
        let mut reader = BufReader::new(File::open(&path).unwrap());
        let count: u32 = bincode::deserialize_from(&mut reader).unwrap();
        assert_eq!(count, 2);
        let first: FieldSnapshot = bincode::deserialize_from(&mut reader).unwrap();
        let second: FieldSnapshot = bincode::deserialize_from(&mut reader).unwrap();
        assert_eq!((first.tick, second.tick), (1, 2));
        assert_eq!(second.cells[0][0], 2);
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn json_output_lists_every_snapshot() {
        let base = temp_base("json");
        let path = save_snapshots(&[snapshot(4)], SnapshotFormat::Json, &base).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let parsed: Vec<FieldSnapshot> = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].layout, ChannelLayout::Direct);
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn unknown_format_falls_back_to_json() {
        assert_eq!(SnapshotFormat::from_config(Some("yaml")), SnapshotFormat::Json);
        assert_eq!(SnapshotFormat::from_config(None), SnapshotFormat::Json);
        assert_eq!(SnapshotFormat::from_config(Some("messagepack")).extension(), "msgpack");
    }

    #[test]
    fn agents_csv_has_header_and_rows() {
        let path = std::env::temp_dir().join(format!("slime_agents_{}.csv", std::process::id()));
        save_agents_csv(&[Agent::new(1.5, 2.0, 0.25, 1)], &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("x,y,heading,species"));
        assert_eq!(lines.next(), Some("1.5000,2.0000,0.25000,1"));
        std::fs::remove_file(path).unwrap();
    }
}
