use std::{fs::File, io::Write, path::PathBuf, rc::Rc};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use fog_games::{
    cache::PublicStateCache,
    gamestates::{
        goofspiel::GoofspielDomain,
        liars_dice::LiarsDiceDomain,
        matching_pennies::{MatchingPenniesDomain, Variant},
        rps::RpsDomain,
        simple_poker::SimplePokerDomain,
    },
    stats::calculate_domain_statistics,
    Domain, EfgNode,
};
use fog_io::{gambit, graphviz};
use log::info;
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Game {
    MpAlternating,
    MpSimultaneous,
    Rps,
    Poker,
    LdSmall,
    Ld,
    Iigs2,
    Iigs3,
    Iigs4,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    /// Gambit EFG 2 R tree.
    Gambit,
    /// GraphViz digraph of the full tree.
    Dot,
    /// GraphViz digraph of the public-state tree.
    PublicDot,
    /// Domain statistics as JSON.
    Stats,
}

/// Export a built-in domain as a Gambit tree, a GraphViz dump, or domain
/// statistics.
#[derive(Parser)]
struct Args {
    #[arg(long, value_enum)]
    game: Game,

    #[arg(long, value_enum, default_value = "stats")]
    format: Format,

    /// Output file; stdout when omitted.
    #[arg(long)]
    out: Option<PathBuf>,

    #[arg(long)]
    verbose: bool,
}

fn build_domain(game: Game) -> Rc<dyn Domain> {
    match game {
        Game::MpAlternating => Rc::new(MatchingPenniesDomain::new(Variant::AlternatingMoves)),
        Game::MpSimultaneous => Rc::new(MatchingPenniesDomain::new(Variant::SimultaneousMoves)),
        Game::Rps => Rc::new(RpsDomain::new()),
        Game::Poker => Rc::new(SimplePokerDomain::new()),
        Game::LdSmall => Rc::new(LiarsDiceDomain::new([1, 0], 2)),
        Game::Ld => Rc::new(LiarsDiceDomain::new([2, 0], 2)),
        Game::Iigs2 => Rc::new(GoofspielDomain::iigs(2)),
        Game::Iigs3 => Rc::new(GoofspielDomain::iigs(3)),
        Game::Iigs4 => Rc::new(GoofspielDomain::iigs(4)),
    }
}

fn run(args: Args, out: &mut impl Write) -> Result<()> {
    let domain = build_domain(args.game);
    info!("exporting {}", domain.info());

    match args.format {
        Format::Gambit => {
            let root = EfgNode::root(domain);
            gambit::export_gambit(&root, out)?;
        }
        Format::Dot => {
            let root = EfgNode::root(domain);
            graphviz::export_graphviz(&root, out)?;
        }
        Format::PublicDot => {
            let mut cache = PublicStateCache::new(domain);
            cache.build_tree();
            graphviz::export_public_tree(&cache, out)?;
        }
        Format::Stats => {
            let stats = calculate_domain_statistics(domain);
            writeln!(out, "{}", serde_json::to_string_pretty(&stats)?)?;
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    TermLogger::init(
        level,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )?;

    match args.out.clone() {
        Some(path) => {
            let mut file =
                File::create(&path).with_context(|| format!("cannot create {:?}", path))?;
            run(args, &mut file)
        }
        None => run(args, &mut std::io::stdout().lock()),
    }
}
