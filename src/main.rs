//! vlasimd - inspect the detected vector width and run the VLA add kernel.

use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing_subscriber::EnvFilter;

use vlasimd::simd::stride::{self, StrideProvider};
use vlasimd::{
    par_vector_add_chunked, scalar_add, vector_add, FixedStride, KernelConfig, MAX_LANES,
};

/// Vector-length-agnostic SIMD kernels
#[derive(Parser, Debug)]
#[command(name = "vlasimd")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the vector capability detected on this machine
    Detect,

    /// Add two random vectors and check the result against a scalar loop
    Add {
        /// Number of elements
        #[arg(long, default_value_t = 1024)]
        len: usize,

        /// Force a step width instead of the detected one
        #[arg(long)]
        stride: Option<usize>,

        /// Split the work across the rayon pool
        #[arg(long)]
        parallel: bool,

        /// Seed for the input generator
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Detect => detect(),
        Commands::Add {
            len,
            stride,
            parallel,
            seed,
        } => add(len, stride, parallel, seed),
    }
}

fn detect() -> Result<()> {
    let capability = stride::detect();

    println!("capability:        {capability}");
    println!("isa:               {}", capability.isa);
    println!("vector bits:       {}", capability.vector_bits);
    println!("elements per step: {}", capability.lanes());
    println!("build feature:     {}", stride::build_feature());

    Ok(())
}

fn add(len: usize, stride: Option<usize>, parallel: bool, seed: u64) -> Result<()> {
    let mut config = KernelConfig::from_env().context("reading VLASIMD_* overrides")?;
    if let Some(width) = stride {
        config = config.with_stride(FixedStride::new(width).context("--stride")?);
    }
    let provider = config.stride_provider();
    let width = provider.elements_per_step().min(MAX_LANES);

    let mut rng = StdRng::seed_from_u64(seed);
    let a: Vec<f32> = (0..len).map(|_| rng.random::<f32>()).collect();
    let b: Vec<f32> = (0..len).map(|_| rng.random::<f32>()).collect();
    let mut c = vec![0.0f32; len];

    let start = Instant::now();
    if parallel {
        par_vector_add_chunked(&mut c, &a, &b, len, &provider, config.parallel_chunk_size);
    } else {
        vector_add(&mut c, &a, &b, len, &provider);
    }
    let elapsed = start.elapsed();

    let expected = scalar_add(&a, &b);
    let mismatches = c
        .iter()
        .zip(expected.iter())
        .filter(|(x, y)| x.to_bits() != y.to_bits())
        .count();

    println!("{config}");
    println!("elements:          {len}");
    println!("elements per step: {width}");
    println!("steps:             {}", len.div_ceil(width));
    println!("elapsed:           {elapsed:?}");

    if mismatches > 0 {
        bail!("{mismatches} of {len} elements differ from the scalar result");
    }

    println!("result matches scalar addition");
    Ok(())
}
