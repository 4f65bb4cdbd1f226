use std::{fs::OpenOptions, io::Write, path::PathBuf, time::Instant};

use anyhow::{anyhow, Result};
use clap::Parser;
use colored::Colorize;
use synthex::{
    context::SynthesisContext,
    enumerators::{Generator, GeneratorFactory},
    exprs::Expr,
    semantics::{core::CoreInstantiator, lia::LiaInstantiator},
    smt::smt_boolector::SmtGateway,
    solver::Solver,
    types::{Type, Value},
};
use tracing::debug;

#[derive(Parser)]
#[command(name = "synthex", about = "Enumerative CEGIS synthesis benchmark harness")]
struct Args {
    /// Benchmark identifier, e.g. `max2` or `max3`.
    benchmark: String,

    /// Log file; one record is appended per solved instance.
    log: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let arity = parse_benchmark(&args.benchmark)?;
    debug!(arity, "running max benchmark");

    let start = Instant::now();
    let outcome = solve_max(arity)?;
    let elapsed = start.elapsed();

    let mut log = OpenOptions::new().create(true).append(true).open(&args.log)?;
    match outcome {
        Some((expr, points)) => {
            println!("{} {expr}", "solved:".green());
            writeln!(
                log,
                "max of {arity} arguments:\n{expr}\ncomputed in {} seconds\nAdded {points} counterexample points in total",
                elapsed.as_secs_f64(),
            )?;
        }
        None => {
            println!("{}", "no solution within the size bounds".red());
            writeln!(log, "max of {arity} arguments: no solution")?;
        }
    }
    Ok(())
}

fn parse_benchmark(benchmark: &str) -> Result<usize> {
    let arity = benchmark
        .strip_prefix("max")
        .and_then(|n| n.parse::<usize>().ok())
        .ok_or_else(|| anyhow!("unknown benchmark `{benchmark}`; expected `max<N>`"))?;
    if arity < 2 {
        return Err(anyhow!("`max` needs at least two arguments"));
    }
    Ok(arity)
}

/// The max-of-N instance from the original term/predicate grammars:
/// terms over `{x_i, 0, 1, add, sub}`, predicates `{le, eq, ge}`.
fn solve_max(arity: usize) -> Result<Option<(String, usize)>> {
    let ctx = SynthesisContext::new(vec![
        Box::new(CoreInstantiator::new()),
        Box::new(LiaInstantiator::new()),
    ]);
    let max_fun = ctx.make_synth_fun("max", vec![Type::Int; arity], Type::Int);

    let mut vars = Vec::with_capacity(arity);
    for i in 0..arity {
        vars.push(ctx.make_variable(Type::Int, &format!("x{i}"), i)?);
    }
    let app = ctx.make_app(&max_fun, vars.clone());
    let mut ge_constraints = Vec::with_capacity(arity);
    let mut eq_constraints = Vec::with_capacity(arity);
    for var in &vars {
        ge_constraints.push(ctx.make_function_expr("ge", vec![app.clone(), var.clone()])?);
        eq_constraints.push(ctx.make_function_expr("eq", vec![app.clone(), var.clone()])?);
    }
    let spec = ctx.make_function_expr(
        "and",
        vec![
            ctx.make_ac_function_expr("and", ge_constraints)?,
            ctx.make_ac_function_expr("or", eq_constraints)?,
        ],
    )?;
    ctx.assert_spec(spec);

    let mut leaves = ctx.formal_parameters(&max_fun);
    leaves.push(Expr::constant(Value::Int(0)));
    leaves.push(Expr::constant(Value::Int(1)));
    let leaf_gen = Generator::leaf(leaves);

    let add = ctx.instantiate_function("add", &[Type::Int, Type::Int])?;
    let sub = ctx.instantiate_function("sub", &[Type::Int, Type::Int])?;
    let le = ctx.instantiate_function("le", &[Type::Int, Type::Int])?;
    let eq = ctx.instantiate_function("eq", &[Type::Int, Type::Int])?;
    let ge = ctx.instantiate_function("ge", &[Type::Int, Type::Int])?;

    let factory = GeneratorFactory::new();
    let term_ph = factory.placeholder("Term")?;
    let term_generator = factory.define(
        "Term",
        Generator::alt(vec![
            leaf_gen,
            Generator::func(add, vec![term_ph.clone(), term_ph.clone()]),
            Generator::func(sub, vec![term_ph.clone(), term_ph.clone()]),
        ]),
    );
    let pred_generator = Generator::alt(vec![
        Generator::func(le, vec![term_ph.clone(), term_ph.clone()]),
        Generator::func(eq, vec![term_ph.clone(), term_ph.clone()]),
        Generator::func(ge, vec![term_ph.clone(), term_ph]),
    ]);

    let mut solver = Solver::new(&ctx);
    let mut gateway = SmtGateway::new(&ctx);
    let result = solver.solve(term_generator, pred_generator, &mut gateway)?;
    Ok(result.map(|expr| (expr.to_string(), solver.num_points())))
}
