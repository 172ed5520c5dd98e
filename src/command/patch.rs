use std::path::{Path, PathBuf};

use clap::Args;
use owo_colors::Style;
use rand::rngs::StdRng;
use rand::SeedableRng;

use mi1_shuffle::dot::{write_forest_map, write_room_map};
use mi1_shuffle::fixups::{fix_forest_gate, room_script_fixups};
use mi1_shuffle::links::generate_room_links;
use mi1_shuffle::mutators::{
    add_version_banner, debug_mode, skip_code_wheel, turbo_mode, TURBO_TIMER_INTERVAL,
};
use mi1_shuffle::shuffle::{extract_forest_graph, shuffle_forest, shuffle_rooms};
use mi1_shuffle::sword::non_sequitur_swordfighting;
use mi1_shuffle::{Session, ShuffleError};

use crate::command::global_args::GlobalArgs;
use crate::command::ShuffleCommand;
use crate::tint::Tint;

/// Patch the game files into a randomised copy.
#[derive(Args, Debug)]
pub struct Patch {
    /// Path containing the input MI1 game files.
    pub source: PathBuf,
    /// Path to write the patched files to.
    pub dest: PathBuf,
    /// Randomise the exit links between the game's rooms.
    #[clap(long)]
    pub shuffle_rooms: bool,
    /// Ensure links between indoor and outdoor areas keep that
    /// transition. Reserved; accepted but not applied yet.
    #[clap(long)]
    pub keep_transitions: bool,
    /// Rearrange the subroom links of the Melee Island forest.
    #[clap(long)]
    pub shuffle_forest: bool,
    /// Shuffle the mapping of insults to retorts for the swordfighting
    /// section. The Sword Master's insults respect the new ordering.
    #[clap(long)]
    pub non_sequitur_swordfighting: bool,
    /// Also randomise the order of insults in the dialog menu.
    #[clap(long)]
    pub change_insult_order: bool,
    /// Number used to seed the random number generator.
    #[clap(long)]
    pub random_seed: Option<u64>,
    /// Bypass the copy-protection code wheel screen.
    #[clap(long)]
    pub skip_code_wheel: bool,
    /// Enable the original debugging features.
    #[clap(long)]
    pub debug_mode: bool,
    /// Force the game to run at a much faster framerate.
    #[clap(long)]
    pub turbo_mode: bool,
    /// Export game maps in DOT format to this directory, before and
    /// after each shuffle.
    #[clap(long)]
    pub output_maps: Option<PathBuf>,
}

impl ShuffleCommand for Patch {
    fn run(self, _global_args: GlobalArgs) -> Result<(), ShuffleError> {
        if self.source == self.dest {
            eprintln!(
                "{}",
                "Source and destination paths must be different".tint(Style::new().red())
            );
            std::process::exit(1);
        }

        let uses_random =
            self.shuffle_rooms || self.shuffle_forest || self.non_sequitur_swordfighting;
        let seed = self
            .random_seed
            .unwrap_or_else(|| rand::random::<u32>() as u64);
        if uses_random {
            log::info!("Using random seed {seed}");
        }
        if let Some(maps) = &self.output_maps {
            std::fs::create_dir_all(maps).map_err(|e| {
                ShuffleError::Io(format!("Couldn't create {}", maps.display()), e)
            })?;
        }

        let mut session = Session::load(&self.source)?;
        log::info!("Modifying code...");

        if self.shuffle_rooms || self.shuffle_forest {
            fix_forest_gate(&mut session)?;
        }
        if self.keep_transitions {
            log::warn!("--keep-transitions is reserved and not applied yet");
        }
        if self.shuffle_rooms {
            let mut rng = StdRng::seed_from_u64(seed);
            room_script_fixups(&mut session)?;
            self.dump_room_map(&session, "rooms-before.dot")?;
            shuffle_rooms(&mut session, &mut rng)?;
            self.dump_room_map(&session, "rooms-after.dot")?;
        }
        if self.shuffle_forest {
            let mut rng = StdRng::seed_from_u64(seed);
            self.dump_forest_map(&session, "forest-before.dot")?;
            shuffle_forest(&mut session, &mut rng)?;
            self.dump_forest_map(&session, "forest-after.dot")?;
        }
        if self.non_sequitur_swordfighting {
            let mut rng = StdRng::seed_from_u64(seed);
            non_sequitur_swordfighting(&mut session, &mut rng, self.change_insult_order)?;
        }
        if self.skip_code_wheel {
            skip_code_wheel(&mut session)?;
        }
        if self.debug_mode {
            debug_mode(&mut session)?;
        }
        if self.turbo_mode {
            turbo_mode(&mut session, TURBO_TIMER_INTERVAL)?;
        }
        if uses_random {
            add_version_banner(&mut session, seed)?;
        }

        session.save(&self.dest)?;
        log::info!("Done.");
        Ok(())
    }
}

impl Patch {
    fn dump_room_map(&self, session: &Session, name: &str) -> Result<(), ShuffleError> {
        let Some(maps) = &self.output_maps else {
            return Ok(());
        };
        write_map_file(maps, name, |path| {
            let links = generate_room_links(session);
            write_room_map(path, session, &links)
        })
    }

    fn dump_forest_map(&self, session: &Session, name: &str) -> Result<(), ShuffleError> {
        let Some(maps) = &self.output_maps else {
            return Ok(());
        };
        write_map_file(maps, name, |path| {
            let graph = extract_forest_graph(session);
            write_forest_map(path, &graph)
        })
    }
}

fn write_map_file(
    dir: &Path,
    name: &str,
    write: impl FnOnce(&Path) -> Result<(), ShuffleError>,
) -> Result<(), ShuffleError> {
    let path = dir.join(name);
    log::info!("Writing {}...", path.display());
    write(&path)
}
