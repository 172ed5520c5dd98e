use std::path::PathBuf;

use clap::Args;
use owo_colors::Style;

use mi1_shuffle::links::verb_name;
use mi1_shuffle::script::Script;
use mi1_shuffle::{Session, ShuffleError};

use crate::command::global_args::GlobalArgs;
use crate::command::ShuffleCommand;
use crate::tint::Tint;

/// List every room, resource and disassembled script in the game files.
#[derive(Args, Debug)]
pub struct Dump {
    /// Path containing the input MI1 game files.
    pub source: PathBuf,
    /// Also print the disassembly of every script.
    #[clap(short, long)]
    pub disassemble: bool,
}

impl ShuffleCommand for Dump {
    fn run(self, _global_args: GlobalArgs) -> Result<(), ShuffleError> {
        let session = Session::load(&self.source)?;
        for (room_id, room) in &session.rooms {
            println!(
                "- {} ({})",
                format!("room {room_id}").tint(Style::new().green().bold()),
                room.name.as_deref().unwrap_or("unnamed")
            );
            for (gid, global) in &room.globals {
                println!("  - global script {gid}");
                self.print_script(&global.script, "    ");
            }
            for (lid, local) in &room.locals {
                println!("  - local script {lid}");
                self.print_script(&local.script, "    ");
            }
            for (object_id, object) in &room.objects {
                println!(
                    "  - object {object_id} ({})",
                    String::from_utf8_lossy(&object.name).tint(Style::new().yellow())
                );
                for verb in &object.verbs {
                    let verb_label = verb_name(verb.verb)
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("verb {}", verb.verb));
                    println!("    - verb {} ({verb_label})", verb.verb);
                    self.print_script(&verb.script, "      ");
                }
            }
            if let Some(entry) = &room.entry {
                println!("  - entry script ({} instructions)", entry.script.len());
                self.print_script(&entry.script, "    ");
            }
            if let Some(exit) = &room.exit {
                println!("  - exit script ({} instructions)", exit.script.len());
                self.print_script(&exit.script, "    ");
            }
            for sid in room.sounds.keys() {
                println!("  - sound {sid}");
            }
            for cid in room.costumes.keys() {
                println!("  - costume {cid}");
            }
        }
        Ok(())
    }
}

impl Dump {
    fn print_script(&self, script: &Script, prefix: &str) {
        if !self.disassemble {
            return;
        }
        for (offset, instr) in script {
            println!(
                "{prefix}[{}] {:?}",
                format!("{offset:04x}").tint(Style::new().blue()),
                instr.op
            );
        }
    }
}
