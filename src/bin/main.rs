use std::fmt;
use std::path::PathBuf;
use std::process::exit;

use anyhow::{Context, bail, ensure};
use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use sparse_spmd::algorithm::{Node, Solution};
use sparse_spmd::algorithm::lower_upper::Factors;
use sparse_spmd::config::SolverConfig;
use sparse_spmd::data::linear_algebra::{Direction, MatrixError};
use sparse_spmd::data::linear_algebra::matrix::SparseMatrix;
use sparse_spmd::data::linear_algebra::vector::SparseVector;
use sparse_spmd::distributed::World;
use sparse_spmd::io::{Format, import};

/// Distributed operations on sparse matrices.
#[derive(Parser)]
#[command(version)]
struct Opts {
    /// One or two matrix files. For `cg`, the first column of the second file is the right hand
    /// side.
    #[arg(required = true, num_args = 1..=2)]
    matrices: Vec<PathBuf>,
    /// Operation to run.
    #[arg(value_enum)]
    operation: Operation,
    /// Number of ranks, including the coordinator.
    #[arg(short, long, default_value_t = 4)]
    processes: usize,
    /// Read the files as dense grids instead of `col row value` lines.
    #[arg(long)]
    dense: bool,
    /// TOML file with solver settings.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Operation {
    Mul,
    Add,
    Sub,
    Lu,
    Ilu,
    Inverse,
    Cg,
}

impl Operation {
    fn needs_second(self) -> bool {
        matches!(self, Operation::Mul | Operation::Add | Operation::Sub | Operation::Cg)
    }
}

/// What the coordinator prints.
enum Outcome {
    Matrix(SparseMatrix),
    Factors(Factors),
    Solution(Solution),
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Outcome::Matrix(matrix) => write!(f, "{matrix}"),
            Outcome::Factors(Factors { lower, upper }) => write!(f, "L:\n{lower}U:\n{upper}"),
            Outcome::Solution(Solution { x, iterations, residual }) => {
                writeln!(f, "iterations: {iterations}")?;
                writeln!(f, "residual: {residual:e}")?;
                for (index, value) in x.iter() {
                    writeln!(f, "{index} {value}")?;
                }
                Ok(())
            },
        }
    }
}

/// Operands as read from the files.
enum Operands {
    Single(SparseMatrix),
    Pair(SparseMatrix, SparseMatrix),
    System(SparseMatrix, SparseVector),
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let opts = Opts::parse();
    match run(opts) {
        Ok(outcome) => print!("{outcome}"),
        Err(error) => {
            eprintln!("error: {error:#}");
            exit(1);
        },
    }
}

fn run(opts: Opts) -> anyhow::Result<Outcome> {
    ensure!(opts.processes > 0, "at least one process is needed");

    let config = match &opts.config {
        Some(path) => SolverConfig::from_file(path)
            .with_context(|| format!("reading configuration {}", path.display()))?,
        None => SolverConfig::default(),
    };
    let operands = read_operands(&opts)?;

    info!(operation = ?opts.operation, processes = opts.processes, "starting");
    let mut results = World::new(opts.processes).run(|communicator| {
        let node = Node::with_config(communicator, config.clone());
        execute(&node, opts.operation, &operands)
    })?;

    let coordinator = results.swap_remove(0)
        .with_context(|| format!("{:?} failed", opts.operation))?;
    coordinator.context("the coordinator produced no result")
}

fn read_operands(opts: &Opts) -> anyhow::Result<Operands> {
    let format = if opts.dense { Format::Dense } else { Format::Sparse };
    let read = |path: &PathBuf, direction| import(path, format, direction)
        .with_context(|| format!("reading matrix {}", path.display()));

    let (first, second) = match opts.matrices.as_slice() {
        [first] => (first, None),
        [first, second] => (first, Some(second)),
        _ => bail!("expected one or two matrix files"),
    };

    let second = match (opts.operation.needs_second(), second) {
        (true, None) => bail!("{:?} needs a second matrix file", opts.operation),
        (true, Some(second)) => second,
        (false, _) => return Ok(Operands::Single(read(first, Direction::ColumnWise)?)),
    };

    let left = read(first, Direction::ColumnWise)?;
    if opts.operation == Operation::Cg {
        let right = read(second, Direction::ColumnWise)?;
        let rhs = right.vectors().first().cloned()
            .context("the right hand side file has no columns")?;
        Ok(Operands::System(left, rhs))
    } else {
        Ok(Operands::Pair(left, read(second, Direction::RowWise)?))
    }
}

/// The part of the program that every rank runs.
fn execute(node: &Node, operation: Operation, operands: &Operands) -> Result<Option<Outcome>, MatrixError> {
    let pair = || match operands {
        Operands::Pair(left, right) => (left.clone(), right.clone()),
        Operands::Single(matrix) | Operands::System(matrix, _) => (matrix.clone(), matrix.clone()),
    };
    let single = || match operands {
        Operands::Single(matrix) | Operands::Pair(matrix, _) | Operands::System(matrix, _) => matrix.clone(),
    };

    Ok(match operation {
        Operation::Mul => node.mul(node.role(pair))?.map(Outcome::Matrix),
        Operation::Add => node.add(node.role(pair))?.map(Outcome::Matrix),
        Operation::Sub => node.sub(node.role(pair))?.map(Outcome::Matrix),
        Operation::Lu => node.lu(node.role(single))?.map(Outcome::Factors),
        Operation::Ilu => node.ilu(node.role(single))?.map(Outcome::Factors),
        Operation::Inverse => node.inverse(node.role(single))?.map(Outcome::Matrix),
        Operation::Cg => {
            let system = || match operands {
                Operands::System(matrix, rhs) => (matrix.clone(), rhs.clone()),
                Operands::Single(matrix) | Operands::Pair(matrix, _) =>
                    (matrix.clone(), SparseVector::empty(matrix.height(), Direction::ColumnWise)),
            };
            node.cg(node.role(system))?.map(Outcome::Solution)
        },
    })
}
