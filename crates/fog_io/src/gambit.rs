//! Gambit "EFG 2 R" tree export and import.
//!
//! The writer walks an EFG and emits one `c` / `p` / `t` line per node,
//! indented by depth. Infoset and public-state labels are numbered in
//! discovery order; the public-state label rides in the quoted slot after
//! the node index so a round trip can reconstruct the public partition.
//! The reader parses the same syntax into an in-memory tree backing
//! [`GambitDomain`], which implements the ordinary `Domain` trait.

use std::{collections::HashMap, io::Write, rc::Rc};

use anyhow::{anyhow, bail, Context, Result};
use fog_games::{
    domain::{NoObservation, Observation, Outcome, OutcomeDistribution, OutcomeEntry},
    efg::{EfgNode, NodeKind, Specialization},
    hashing::{self, HashValue},
    istate::{Aoh, PublicState},
    Action, ActionId, Domain, ObservationId, Player, State,
};

/// Write the tree rooted at `node` in Gambit syntax.
pub fn export_gambit(root: &Rc<EfgNode>, out: &mut impl Write) -> Result<()> {
    writeln!(out, "EFG 2 R \"\" {{ \"Pl0\" \"Pl1\" }}")?;
    writeln!(out, "\"\"")?;

    let mut writer = GambitWriter::default();
    writer.write_node(root, out)
}

#[derive(Default)]
struct GambitWriter {
    chance_index: usize,
    terminal_index: usize,
    infoset_labels: HashMap<Aoh, usize>,
    public_state_labels: HashMap<PublicState, usize>,
}

impl GambitWriter {
    fn infoset_label(&mut self, infoset: Aoh) -> usize {
        let next = self.infoset_labels.len() + 1;
        *self.infoset_labels.entry(infoset).or_insert(next)
    }

    fn public_state_label(&mut self, node: &Rc<EfgNode>) -> String {
        if node.specialization() != Specialization::Ordinary {
            return String::new();
        }
        let next = self.public_state_labels.len() + 1;
        let label = *self
            .public_state_labels
            .entry(node.public_state())
            .or_insert(next);
        label.to_string()
    }

    fn write_node(&mut self, node: &Rc<EfgNode>, out: &mut impl Write) -> Result<()> {
        for _ in 0..node.depth() {
            write!(out, " ")?;
        }
        match node.kind() {
            NodeKind::Chance => {
                let public_state = self.public_state_label(node);
                write!(out, "c \"\" {} \"{}\" {{ ", self.chance_index, public_state)?;
                self.chance_index += 1;
                for (i, prob) in node.chance_probs().iter().enumerate() {
                    write!(out, "\"{}\" {} ", i, prob)?;
                }
                writeln!(out, "}} 0")?;
            }
            NodeKind::Player => {
                let player = node.current_player().expect("player node");
                let infoset = self.infoset_label(node.current_infoset());
                let public_state = self.public_state_label(node);
                write!(
                    out,
                    "p \"\" {} {} \"{}\" {{ ",
                    player + 1,
                    infoset,
                    public_state
                )?;
                for action in node.available_actions() {
                    write!(out, "\"{}\" ", action.label())?;
                }
                writeln!(out, "}} 0")?;
            }
            NodeKind::Terminal => {
                let public_state = self.public_state_label(node);
                let utilities = node.utilities();
                writeln!(
                    out,
                    "t \"\" {} \"{}\" {{ {}, {} }}",
                    self.terminal_index, public_state, utilities[0], utilities[1]
                )?;
                self.terminal_index += 1;
                return Ok(());
            }
        }

        for edge in 0..node.count_available_actions() {
            let child = node.perform_action(&node.action_by_id(edge as u32));
            self.write_node(&child, out)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParsedKind {
    Chance,
    Player,
    Terminal,
}

/// One node of the parsed Gambit tree.
#[derive(Debug)]
struct ParsedNode {
    id: u32,
    kind: ParsedKind,
    player: Player,
    infoset_label: u32,
    public_state_label: Option<u32>,
    probs: Vec<f64>,
    action_labels: Vec<String>,
    utilities: [f64; 2],
    children: Vec<Rc<ParsedNode>>,
}

/// A domain backed by a parsed Gambit tree.
pub struct GambitDomain {
    root: Rc<ParsedNode>,
    max_state_depth: usize,
    max_abs_utility: f64,
    zero_sum: bool,
}

impl GambitDomain {
    pub fn parse(input: &str) -> Result<Self> {
        let mut lines = input.lines().enumerate().filter(|(_, line)| {
            let trimmed = line.trim();
            !trimmed.is_empty() && !trimmed.starts_with('#')
        });

        let (_, header) = lines.next().ok_or_else(|| anyhow!("empty input"))?;
        if !header.trim_start().starts_with("EFG 2 R") {
            bail!("not an EFG 2 R file: {}", header);
        }

        let mut next_id = 0u32;
        let mut peeked = lines.next();
        // optional comment line after the header
        if let Some((_, line)) = peeked {
            if line.trim_start().starts_with('"') {
                peeked = lines.next();
            }
        }
        let (line_number, first) = peeked.ok_or_else(|| anyhow!("no node lines"))?;
        let root = parse_subtree(first, line_number, &mut lines, &mut next_id)?;

        let mut max_depth = 0;
        let mut max_util: f64 = 0.0;
        let mut zero_sum = true;
        measure(&root, 0, &mut max_depth, &mut max_util, &mut zero_sum);

        Ok(Self {
            root,
            max_state_depth: max_depth + 2,
            max_abs_utility: max_util,
            zero_sum,
        })
    }
}

fn parse_subtree<'a>(
    line: &str,
    line_number: usize,
    lines: &mut impl Iterator<Item = (usize, &'a str)>,
    next_id: &mut u32,
) -> Result<Rc<ParsedNode>> {
    let mut node = parse_node_line(line)
        .with_context(|| format!("cannot parse node at line {}", line_number + 1))?;
    node.id = *next_id;
    *next_id += 1;

    let child_count = match node.kind {
        ParsedKind::Chance => node.probs.len(),
        ParsedKind::Player => node.action_labels.len(),
        ParsedKind::Terminal => 0,
    };
    for _ in 0..child_count {
        let (child_line_number, child_line) = lines
            .next()
            .ok_or_else(|| anyhow!("premature end of file below line {}", line_number + 1))?;
        node.children
            .push(parse_subtree(child_line, child_line_number, lines, next_id)?);
    }
    Ok(Rc::new(node))
}

#[derive(Debug, PartialEq)]
enum Token {
    Str(String),
    Num(f64),
    Open,
    Close,
}

fn tokenize(line: &str) -> Result<Vec<Token>> {
    let mut tokens = vec![];
    let mut chars = line.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | ',' => {
                chars.next();
            }
            '{' => {
                chars.next();
                tokens.push(Token::Open);
            }
            '}' => {
                chars.next();
                tokens.push(Token::Close);
            }
            '"' => {
                chars.next();
                let mut s = String::new();
                for ch in chars.by_ref() {
                    if ch == '"' {
                        break;
                    }
                    s.push(ch);
                }
                tokens.push(Token::Str(s));
            }
            _ => {
                let mut word = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_whitespace() || ch == ',' || ch == '{' || ch == '}' || ch == '"' {
                        break;
                    }
                    word.push(ch);
                    chars.next();
                }
                let value: f64 = word
                    .parse()
                    .map_err(|_| anyhow!("unexpected token `{}`", word))?;
                tokens.push(Token::Num(value));
            }
        }
    }
    Ok(tokens)
}

fn parse_node_line(line: &str) -> Result<ParsedNode> {
    let trimmed = line.trim_start();
    let kind = match trimmed.chars().next() {
        Some('c') => ParsedKind::Chance,
        Some('p') => ParsedKind::Player,
        Some('t') => ParsedKind::Terminal,
        other => bail!("node type must be c/p/t, got {:?}", other),
    };
    let tokens = tokenize(&trimmed[1..])?;

    let mut node = ParsedNode {
        id: 0,
        kind,
        player: 0,
        infoset_label: 0,
        public_state_label: None,
        probs: vec![],
        action_labels: vec![],
        utilities: [0.0, 0.0],
        children: vec![],
    };

    // skip the node label, read the indices before the braces, then the
    // braced list
    let mut iter = tokens.into_iter();
    let _label = match iter.next() {
        Some(Token::Str(s)) => s,
        other => bail!("expected node label, got {:?}", other),
    };

    let mut pre_brace_numbers = vec![];
    let mut pre_brace_strings = vec![];
    for token in iter.by_ref() {
        match token {
            Token::Open => break,
            Token::Num(n) => pre_brace_numbers.push(n),
            Token::Str(s) => pre_brace_strings.push(s),
            Token::Close => bail!("unexpected closing brace"),
        }
    }
    node.public_state_label = pre_brace_strings
        .first()
        .and_then(|s| s.parse::<u32>().ok());

    match kind {
        ParsedKind::Chance => {
            for token in iter.by_ref() {
                match token {
                    Token::Str(_) => {}
                    Token::Num(p) => node.probs.push(p),
                    Token::Close => break,
                    Token::Open => bail!("nested braces"),
                }
            }
        }
        ParsedKind::Player => {
            let player_number = *pre_brace_numbers
                .first()
                .ok_or_else(|| anyhow!("player node without player index"))?;
            if player_number < 1.0 || player_number > 2.0 {
                bail!("player index {} out of range", player_number);
            }
            node.player = player_number as Player - 1;
            node.infoset_label = *pre_brace_numbers
                .get(1)
                .ok_or_else(|| anyhow!("player node without infoset index"))?
                as u32;
            for token in iter.by_ref() {
                match token {
                    Token::Str(s) => node.action_labels.push(s),
                    Token::Close => break,
                    other => bail!("unexpected token in action list: {:?}", other),
                }
            }
        }
        ParsedKind::Terminal => {
            let mut utilities = vec![];
            for token in iter.by_ref() {
                match token {
                    Token::Num(u) => utilities.push(u),
                    Token::Close => break,
                    Token::Str(_) => {}
                    Token::Open => bail!("nested braces"),
                }
            }
            if utilities.len() != 2 {
                bail!("terminal node with {} utilities", utilities.len());
            }
            node.utilities = [utilities[0], utilities[1]];
        }
    }

    Ok(node)
}

fn measure(
    node: &Rc<ParsedNode>,
    depth: usize,
    max_depth: &mut usize,
    max_util: &mut f64,
    zero_sum: &mut bool,
) {
    *max_depth = (*max_depth).max(depth);
    if node.kind == ParsedKind::Terminal {
        *max_util = max_util.max(node.utilities[0].abs().max(node.utilities[1].abs()));
        if (node.utilities[0] + node.utilities[1]).abs() > 1e-9 {
            *zero_sum = false;
        }
    }
    for child in &node.children {
        measure(child, depth + 1, max_depth, max_util, zero_sum);
    }
}

impl Domain for GambitDomain {
    fn root_outcome_distribution(&self) -> OutcomeDistribution {
        vec![OutcomeEntry::new(entry_outcome(&self.root))]
    }

    fn max_state_depth(&self) -> usize {
        self.max_state_depth
    }

    fn is_zero_sum(&self) -> bool {
        self.zero_sum
    }

    fn max_abs_utility(&self) -> f64 {
        self.max_abs_utility
    }

    fn info(&self) -> String {
        "Imported Gambit game".to_string()
    }
}

/// The outcome that leads into `node`: per-player observations reproduce
/// the recorded infoset labels, the public observation the public-state
/// label, and terminal utilities arrive as edge rewards.
fn entry_outcome(node: &Rc<ParsedNode>) -> Outcome {
    let mut observations: [Rc<dyn Observation>; 2] =
        [Rc::new(NoObservation), Rc::new(NoObservation)];
    if node.kind == ParsedKind::Player {
        observations[node.player] = Rc::new(LabelObservation {
            label: node.infoset_label,
        });
    }
    let public_observation: Rc<dyn Observation> = match node.public_state_label {
        Some(label) => Rc::new(LabelObservation { label }),
        None => Rc::new(NoObservation),
    };
    let rewards = if node.kind == ParsedKind::Terminal {
        node.utilities
    } else {
        [0.0, 0.0]
    };
    Outcome::new(
        Rc::new(GambitState { node: node.clone() }),
        observations,
        public_observation,
        rewards,
    )
}

#[derive(Debug, Clone, Copy)]
struct LabelObservation {
    label: u32,
}

impl Observation for LabelObservation {
    fn id(&self) -> ObservationId {
        self.label
    }
}

#[derive(Debug)]
struct GambitState {
    node: Rc<ParsedNode>,
}

#[derive(Debug, Clone)]
struct GambitAction {
    id: ActionId,
    label: String,
}

impl Action for GambitAction {
    fn id(&self) -> ActionId {
        self.id
    }

    fn label(&self) -> String {
        self.label.clone()
    }
}

impl State for GambitState {
    fn acting_players(&self) -> Vec<Player> {
        match self.node.kind {
            ParsedKind::Player => vec![self.node.player],
            _ => vec![],
        }
    }

    fn count_available_actions(&self, player: Player) -> usize {
        if self.node.kind == ParsedKind::Player && player == self.node.player {
            self.node.action_labels.len()
        } else {
            0
        }
    }

    fn available_actions(&self, player: Player) -> Vec<Rc<dyn Action>> {
        (0..self.count_available_actions(player))
            .map(|id| {
                Rc::new(GambitAction {
                    id: id as ActionId,
                    label: self.node.action_labels[id].clone(),
                }) as Rc<dyn Action>
            })
            .collect()
    }

    fn perform_actions(&self, actions: &[Rc<dyn Action>]) -> OutcomeDistribution {
        match self.node.kind {
            ParsedKind::Player => {
                let child = &self.node.children[actions[self.node.player].id() as usize];
                vec![OutcomeEntry::new(entry_outcome(child))]
            }
            ParsedKind::Chance => self
                .node
                .children
                .iter()
                .zip(self.node.probs.iter())
                .map(|(child, &prob)| OutcomeEntry::with_prob(entry_outcome(child), prob))
                .collect(),
            ParsedKind::Terminal => unreachable!("terminal state"),
        }
    }

    fn is_terminal(&self) -> bool {
        self.node.kind == ParsedKind::Terminal
    }

    fn value_hash(&self) -> HashValue {
        hashing::hash_ids(hashing::TREE_SEED, &[self.node.id])
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn value_eq(&self, other: &dyn State) -> bool {
        other
            .as_any()
            .downcast_ref::<GambitState>()
            .map(|o| o.node.id == self.node.id)
            .unwrap_or(false)
    }
}
