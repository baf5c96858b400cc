use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use grouprank::{
    ColumnRef, ExistingColumnPolicy, RankEngine, RankOptions, RankRequest, SortDirection,
};

use crate::{import_csv, write_csv, CsvOptions};

#[derive(Parser, Debug)]
#[command(
    name = "grouprank",
    about = "Sort a CSV table and append each row's rank within its group."
)]
pub struct Args {
    /// Input CSV file with a header row.
    input: PathBuf,

    /// Group-by columns, comma separated. `#N` refers to the N-th column (0-based).
    #[arg(long = "group-by", value_delimiter = ',')]
    group_by: Vec<String>,

    /// Sort columns, comma separated, in priority order.
    #[arg(long = "sort-by", value_delimiter = ',')]
    sort_by: Vec<String>,

    /// Sort columns (from `--sort-by`) to sort in descending order.
    #[arg(long, value_delimiter = ',', conflicts_with = "directions")]
    descending: Vec<String>,

    /// One direction per sort column (`asc`/`desc` or a numeric code, negative meaning
    /// descending), comma separated.
    #[arg(long, value_delimiter = ',')]
    directions: Vec<String>,

    /// Name of the appended rank column.
    #[arg(long, default_value = "rank")]
    name: String,

    /// Write the ranked table here instead of stdout.
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Rows per partition.
    #[arg(long = "page-size")]
    page_size: Option<usize>,

    /// Scan partitions on the current thread.
    #[arg(long)]
    sequential: bool,

    /// Replace an existing column with the requested name instead of failing.
    #[arg(long)]
    replace: bool,
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    run_with_args(args)
}

pub fn run_with_args(args: Args) -> Result<()> {
    let request = build_request(&args)?;

    let mut csv_options = CsvOptions::default();
    if let Some(page_size) = args.page_size {
        anyhow::ensure!(page_size > 0, "--page-size must be at least 1");
        csv_options.page_size_rows = page_size;
    }

    let file = File::open(&args.input)
        .with_context(|| format!("open {}", args.input.display()))?;
    let table = import_csv(BufReader::new(file), csv_options)
        .with_context(|| format!("read {}", args.input.display()))?;

    let engine = RankEngine::new(RankOptions {
        parallel: !args.sequential,
        existing_column: if args.replace {
            ExistingColumnPolicy::Replace
        } else {
            ExistingColumnPolicy::Reject
        },
    });
    let (ranked, stats) = engine
        .rank_with_stats(&table, &request)
        .with_context(|| format!("rank {}", args.input.display()))?;
    log::info!(
        "ranked {} of {} rows across {} groups in {} partitions",
        stats.ranked_rows,
        stats.ranked_rows + stats.unranked_rows,
        stats.distinct_groups,
        stats.partitions
    );

    let written = match &args.output {
        Some(path) => {
            let file =
                File::create(path).with_context(|| format!("create {}", path.display()))?;
            write_csv(&ranked, BufWriter::new(file))
        }
        None => {
            let stdout = std::io::stdout();
            let handle = stdout.lock();
            write_csv(&ranked, handle)
        }
    };

    match written {
        Ok(()) => Ok(()),
        // A downstream reader that exits early (e.g. `| head`) is not an error.
        Err(err) if is_broken_pipe(&err) => Ok(()),
        Err(err) => Err(err).context("write ranked table"),
    }
}

fn is_broken_pipe(err: &csv::Error) -> bool {
    matches!(err.kind(), csv::ErrorKind::Io(io) if io.kind() == std::io::ErrorKind::BrokenPipe)
}

fn parse_column_ref(raw: &str) -> ColumnRef {
    let raw = raw.trim();
    match raw.strip_prefix('#').map(str::parse::<usize>) {
        Some(Ok(index)) => ColumnRef::Index(index),
        _ => ColumnRef::Name(raw.to_string()),
    }
}

fn build_request(args: &Args) -> Result<RankRequest> {
    let mut request = RankRequest::new(args.name.clone());
    request.group_by = args.group_by.iter().map(|c| parse_column_ref(c)).collect();
    request.sort_by = args.sort_by.iter().map(|c| parse_column_ref(c)).collect();

    request.directions = if args.directions.is_empty() {
        for column in &args.descending {
            anyhow::ensure!(
                args.sort_by.iter().any(|c| c.trim() == column.trim()),
                "--descending column '{column}' is not a sort column"
            );
        }
        args.sort_by
            .iter()
            .map(|c| {
                if args.descending.iter().any(|d| d.trim() == c.trim()) {
                    SortDirection::Descending
                } else {
                    SortDirection::Ascending
                }
            })
            .collect()
    } else {
        args.directions
            .iter()
            .map(|d| d.parse::<SortDirection>())
            .collect::<Result<Vec<_>, _>>()?
    };

    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("grouprank").chain(argv.iter().copied())).unwrap()
    }

    #[test]
    fn descending_flags_map_onto_sort_columns() {
        let args = parse(&[
            "in.csv",
            "--group-by",
            "g",
            "--sort-by",
            "a,b",
            "--descending",
            "b",
        ]);

        let request = build_request(&args).unwrap();

        assert_eq!(request.group_by, vec![ColumnRef::from("g")]);
        assert_eq!(request.sort_by, vec![ColumnRef::from("a"), ColumnRef::from("b")]);
        assert_eq!(
            request.directions,
            vec![SortDirection::Ascending, SortDirection::Descending]
        );
        assert_eq!(request.new_column, "rank");
    }

    #[test]
    fn explicit_directions_are_passed_through() {
        let args = parse(&["in.csv", "--sort-by", "#1", "--directions", "desc,asc"]);

        let request = build_request(&args).unwrap();

        assert_eq!(request.sort_by, vec![ColumnRef::Index(1)]);
        assert_eq!(
            request.directions,
            vec![SortDirection::Descending, SortDirection::Ascending]
        );
    }

    #[test]
    fn numeric_direction_codes_follow_their_sign() {
        let args = parse(&["in.csv", "--sort-by", "a,b", "--directions=-1,2"]);

        let request = build_request(&args).unwrap();

        assert_eq!(
            request.directions,
            vec![SortDirection::Descending, SortDirection::Ascending]
        );

        let args = parse(&["in.csv", "--sort-by", "a", "--directions", "0"]);
        assert!(build_request(&args).is_err());
    }

    #[test]
    fn rejects_unknown_directions_and_stray_descending_columns() {
        let args = parse(&["in.csv", "--sort-by", "s", "--directions", "sideways"]);
        assert!(build_request(&args).is_err());

        let args = parse(&["in.csv", "--sort-by", "s", "--descending", "t"]);
        let err = build_request(&args).unwrap_err();
        assert!(err.to_string().contains("not a sort column"), "{err}");
    }

    #[test]
    fn descending_and_directions_conflict() {
        let result = Args::try_parse_from([
            "grouprank",
            "in.csv",
            "--sort-by",
            "s",
            "--descending",
            "s",
            "--directions",
            "asc",
        ]);
        assert!(result.is_err());
    }
}
