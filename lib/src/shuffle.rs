use std::collections::{BTreeMap, BTreeSet};

use rand::prelude::*;
use rand::rngs::StdRng;

use crate::error::ShuffleError;
use crate::links::{
    find_room_cluster, generate_room_linkmap, generate_room_links, pair_key, LinkOp, LinkTable,
    RoomLink, FOREST_BASE,
};
use crate::script::op::{Instr, Op, Operand};
use crate::script::var::{VarRef, VAR_EGO, VAR_ROOM};
use crate::script::Script;
use crate::session::{ScriptRef, Session};

/// The dock, where the reachability sweep starts.
pub const ORIGIN_ROOM: u16 = 33;
/// The troll bridge; excised from the shuffle pool entirely.
const TROLL_BRIDGE_ROOM: u16 = 57;
/// The island map screen, whose dock edge is one-way.
const MAP_ROOM: u16 = 85;
/// Foyer to mansion east wing; real but unusable as a binding edge.
const UNUSABLE_LINKS: [(u16, u16); 1] = [(53, 36)];

/// Pulls the replacement code for one link site: the single
/// `loadRoomWithEgo`, or the `putActorInRoom` (+ optional `putActor`)
/// pair with a synthetic `actorFollowCamera` appended so the camera
/// actually travels with the player.
fn get_snippet(session: &Session, link: &RoomLink) -> Vec<(usize, Instr)> {
    let Some(code) = session.script(&link.site) else {
        return Vec::new();
    };
    let Some(start) = code.iter().position(|(off, _)| *off == link.offset) else {
        return Vec::new();
    };
    match link.op {
        LinkOp::LoadRoomWithEgo => vec![(0, code[start].1.clone())],
        LinkOp::PutActorInRoom => {
            let mut result = vec![(0, code[start].1.clone())];
            if let Some((_, follow)) = code.get(start + 1) {
                if matches!(follow.op, Op::PutActor { .. }) {
                    result.push((0, follow.clone()));
                }
            }
            result.push((
                0,
                Instr::synthetic(
                    0xD2,
                    Op::ActorFollowCamera {
                        act: Operand::Var(VarRef::new(VAR_EGO)),
                    },
                ),
            ));
            result
        }
    }
}

/// Overwrites the instructions at a link site with a snippet taken from
/// another site, then writes the script back.
fn inject_snippet(
    session: &mut Session,
    link: &RoomLink,
    snippet: &[(usize, Instr)],
) -> Result<(), ShuffleError> {
    if snippet.is_empty() {
        log::warn!("no replacement code for {}, leaving it alone", link.site);
        return Ok(());
    }
    let Some(code) = session.script_mut(&link.site) else {
        log::warn!("{} vanished, skipping rewrite", link.site);
        return Ok(());
    };
    let Some(start) = code.iter().position(|(off, _)| *off == link.offset) else {
        log::warn!(
            "{} has no instruction at 0x{:04X}, skipping rewrite",
            link.site,
            link.offset
        );
        return Ok(());
    };
    let consumed = match link.op {
        LinkOp::LoadRoomWithEgo => 1,
        LinkOp::PutActorInRoom => {
            if code
                .get(start + 1)
                .is_some_and(|(_, follow)| matches!(follow.op, Op::PutActor { .. }))
            {
                2
            } else {
                1
            }
        }
    };
    code.splice(
        start..start + consumed,
        snippet.iter().map(|(_, instr)| (link.offset, instr.clone())),
    );
    session.writeback(&link.site)
}

/// Replacement code per directed link, captured from the pristine
/// extraction. Snippets must come from before any rewiring: a site that
/// was already swapped no longer encodes its original destination.
pub type SnippetTable = BTreeMap<(u16, u16), Vec<(usize, Instr)>>;

pub fn collect_snippets(session: &Session, links: &LinkTable) -> SnippetTable {
    let mut snippets = SnippetTable::new();
    for sites in links.values() {
        for link in sites {
            snippets
                .entry((link.room_src, link.room_dest))
                .or_insert_with(|| get_snippet(session, link));
        }
    }
    snippets
}

/// Swaps a bound frontier edge with a freshly picked hub edge: every site
/// realising `link_src.0 -> link_src.1` receives the head instruction of
/// `link_dest`, and the reverse sites of `link_dest` receive the reverse
/// of `link_src`. The two rooms end up wired to each other.
pub fn exchange_multilinks(
    session: &mut Session,
    links: &LinkTable,
    snippets: &SnippetTable,
    link_src: (u16, u16),
    link_dest: (u16, u16),
) -> Result<(), ShuffleError> {
    let empty_sites = Vec::new();
    let src_sites = links.get(&pair_key(link_src.0, link_src.1)).unwrap_or(&empty_sites);
    let dest_sites = links
        .get(&pair_key(link_dest.0, link_dest.1))
        .unwrap_or(&empty_sites);

    log::debug!("exchanging links {link_src:?} and {link_dest:?}");

    let forward = snippets.get(&link_dest).cloned().unwrap_or_default();
    let reverse = snippets
        .get(&(link_src.1, link_src.0))
        .cloned()
        .unwrap_or_default();
    if forward.is_empty() || reverse.is_empty() {
        log::warn!(
            "missing link code for {link_src:?} <-> {link_dest:?}, skipping this exchange"
        );
        return Ok(());
    }

    let src_forward: Vec<RoomLink> = src_sites
        .iter()
        .filter(|l| (l.room_src, l.room_dest) == link_src)
        .cloned()
        .collect();
    let dest_reverse: Vec<RoomLink> = dest_sites
        .iter()
        .filter(|l| (l.room_src, l.room_dest) == (link_dest.1, link_dest.0))
        .cloned()
        .collect();
    for link in &src_forward {
        inject_snippet(session, link, &forward)?;
    }
    for link in &dest_reverse {
        inject_snippet(session, link, &reverse)?;
    }
    Ok(())
}

/// Main-world shuffle. Frontier expansion from the dock: each unbound
/// edge gets married to a random exit of a random unwired hub, then the
/// hub's remaining exits join the frontier; dead-end rooms attach once
/// the hubs run out.
pub fn shuffle_rooms(session: &mut Session, rng: &mut StdRng) -> Result<(), ShuffleError> {
    let links = generate_room_links(session);
    let snippets = collect_snippets(session, &links);
    let mut linkmap = generate_room_linkmap(&links);

    // Excise the troll bridge and the one-way map->dock edge before
    // partitioning; neither survives a rewire.
    linkmap.remove(&TROLL_BRIDGE_ROOM);
    for neighbours in linkmap.values_mut() {
        neighbours.remove(&TROLL_BRIDGE_ROOM);
    }
    if let Some(neighbours) = linkmap.get_mut(&MAP_ROOM) {
        neighbours.remove(&ORIGIN_ROOM);
    }

    let room_cluster = find_room_cluster(&linkmap, ORIGIN_ROOM);
    let mut hubs: BTreeMap<u16, BTreeSet<u16>> = linkmap
        .iter()
        .filter(|(room, exits)| exits.len() > 1 && room_cluster.contains(room))
        .map(|(&room, exits)| (room, exits.clone()))
        .collect();
    let mut dead_ends: BTreeMap<u16, BTreeSet<u16>> = linkmap
        .iter()
        .filter(|(room, exits)| exits.len() == 1 && room_cluster.contains(room))
        .map(|(&room, exits)| (room, exits.clone()))
        .collect();

    let Some(start_hub) = hubs.remove(&ORIGIN_ROOM) else {
        return Err(ShuffleError::Custom(format!(
            "origin room {ORIGIN_ROOM} has no exits to shuffle"
        )));
    };
    let mut frontier: Vec<(u16, u16)> = start_hub.iter().map(|&x| (ORIGIN_ROOM, x)).collect();

    while !frontier.is_empty() {
        let orig_link = frontier.swap_remove(rng.gen_range(0..frontier.len()));
        log::debug!("--- orig_link: {orig_link:?}, frontier: {frontier:?}");
        if !hubs.is_empty() {
            let hub_id = *hubs
                .keys()
                .nth(rng.gen_range(0..hubs.len()))
                .expect("hub set is non-empty");
            let hub = hubs.remove(&hub_id).expect("key just came from the map");
            let mut hub_links: Vec<(u16, u16)> = hub.iter().map(|&h| (hub_id, h)).collect();
            // Edges whose reverse is unusable (or is the edge being bound)
            // can't be married here; they go back in the pool.
            hub_links.retain(|&edge| {
                let reverse = (edge.1, edge.0);
                if UNUSABLE_LINKS.contains(&reverse) || reverse == orig_link {
                    frontier.push(edge);
                    false
                } else {
                    true
                }
            });
            if hub_links.is_empty() {
                log::warn!("hub {hub_id} has no usable exits, dropping edge {orig_link:?}");
                continue;
            }
            let picked = hub_links.swap_remove(rng.gen_range(0..hub_links.len()));
            let new_link = (picked.1, picked.0);
            log::debug!("--- new_link: {new_link:?}, hubs left: {}", hubs.len());
            exchange_multilinks(session, &links, &snippets, orig_link, new_link)?;
            frontier.extend(hub_links);
        } else if !dead_ends.is_empty() {
            let dead_end_id = *dead_ends
                .keys()
                .nth(rng.gen_range(0..dead_ends.len()))
                .expect("dead-end set is non-empty");
            let dead_end = dead_ends
                .remove(&dead_end_id)
                .expect("key just came from the map");
            let Some(&neighbour) = dead_end.iter().next() else {
                continue;
            };
            let new_link = (neighbour, dead_end_id);
            log::debug!("--- dead-end link: {new_link:?}, left: {}", dead_ends.len());
            exchange_multilinks(session, &links, &snippets, orig_link, new_link)?;
        } else {
            log::warn!("ran out of rooms with edge {orig_link:?} still unbound");
        }
    }
    Ok(())
}

/// One editable forest site: a `loadRoomWithEgo` inside a dispatcher
/// script, guarded by an `isEqual(VAR_ROOM, subroom)` check.
#[derive(Debug, Clone)]
pub struct ForestSite {
    pub site: ScriptRef,
    pub offset: usize,
}

/// Live view of the forest subroom graph: directed intra-forest edge to
/// the site whose instruction realises it.
#[derive(Debug, Default)]
pub struct ForestGraph {
    pub edges: BTreeMap<(u16, u16), ForestSite>,
}

impl ForestGraph {
    pub fn neighbours(&self, room: u16) -> Vec<u16> {
        self.edges
            .keys()
            .filter(|(src, _)| *src == room)
            .map(|(_, dest)| *dest)
            .collect()
    }

    fn take(&mut self, key: (u16, u16)) -> Result<ForestSite, ShuffleError> {
        self.edges.remove(&key).ok_or_else(|| {
            ShuffleError::Custom(format!("forest graph has no edge {key:?}"))
        })
    }
}

fn scan_forest_script(script: &Script, site_of: impl Fn() -> ScriptRef, graph: &mut ForestGraph) {
    let mut guard: Option<u16> = None;
    for (offset, instr) in script {
        match &instr.op {
            Op::IsEqual {
                a,
                b: Operand::Imm(src),
                ..
            } if a.id == VAR_ROOM => {
                guard = u16::try_from(*src).ok();
            }
            Op::LoadRoomWithEgo {
                room: Operand::Imm(dest),
                ..
            } => {
                let dest = *dest as u16;
                // Only subroom-to-subroom hops are rewireable; entries
                // from the outer world and the four outer exits stay.
                if dest >= FOREST_BASE {
                    if let Some(src) = guard.filter(|&s| s >= FOREST_BASE) {
                        let key = (src, dest);
                        let site = ForestSite {
                            site: site_of(),
                            offset: *offset,
                        };
                        if graph.edges.insert(key, site).is_some() {
                            log::warn!("duplicate forest edge {key:?}, keeping the last site");
                        }
                    }
                }
            }
            _ => {}
        }
    }
}

/// Walks every script for forest dispatcher code and builds the subroom
/// graph.
pub fn extract_forest_graph(session: &Session) -> ForestGraph {
    let mut graph = ForestGraph::default();
    for (&room_id, room) in &session.rooms {
        for (&object_id, object) in &room.objects {
            for verb in &object.verbs {
                scan_forest_script(
                    &verb.script,
                    || ScriptRef::ObjectVerb {
                        room: room_id,
                        object: object_id,
                        verb: verb.verb,
                    },
                    &mut graph,
                );
            }
        }
        for (&local_id, local) in &room.locals {
            scan_forest_script(
                &local.script,
                || ScriptRef::Local {
                    room: room_id,
                    id: local_id,
                },
                &mut graph,
            );
        }
    }
    graph
}

fn site_instr(session: &Session, site: &ForestSite) -> Result<Instr, ShuffleError> {
    session
        .script(&site.site)
        .and_then(|code| {
            code.iter()
                .find(|(off, _)| *off == site.offset)
                .map(|(_, instr)| instr.clone())
        })
        .ok_or_else(|| {
            ShuffleError::Custom(format!(
                "forest site {} at 0x{:04X} is gone",
                site.site, site.offset
            ))
        })
}

fn set_site_instr(
    session: &mut Session,
    site: &ForestSite,
    instr: Instr,
) -> Result<(), ShuffleError> {
    let code = session.script_mut(&site.site).ok_or_else(|| {
        ShuffleError::Custom(format!("forest site {} is gone", site.site))
    })?;
    let slot = code
        .iter_mut()
        .find(|(off, _)| *off == site.offset)
        .ok_or_else(|| {
            ShuffleError::Custom(format!(
                "forest site {} has no instruction at 0x{:04X}",
                site.site, site.offset
            ))
        })?;
    slot.1 = instr;
    session.writeback(&site.site)
}

/// Exchanges one exit pair between two hubs: `h1<->x` and `h2<->y`
/// become `h1<->y` and `h2<->x`, editing all four sites. The sites come
/// out of a pre-taken pool: when the hubs share neighbours, taking edges
/// lazily would collide with the fresh inserts of earlier pairs.
pub fn forest_room_link_swap(
    session: &mut Session,
    graph: &mut ForestGraph,
    pool: &mut BTreeMap<(u16, u16), ForestSite>,
    pair_a: (u16, u16),
    pair_b: (u16, u16),
) -> Result<(), ShuffleError> {
    let (h1, x) = pair_a;
    let (h2, y) = pair_b;
    let mut take = |key: (u16, u16)| -> Result<ForestSite, ShuffleError> {
        pool.remove(&key)
            .ok_or_else(|| ShuffleError::Custom(format!("forest edge {key:?} not in the pool")))
    };
    let s_h1x = take((h1, x))?;
    let s_xh1 = take((x, h1))?;
    let s_h2y = take((h2, y))?;
    let s_yh2 = take((y, h2))?;

    let to_x = site_instr(session, &s_h1x)?;
    let to_h1 = site_instr(session, &s_xh1)?;
    let to_y = site_instr(session, &s_h2y)?;
    let to_h2 = site_instr(session, &s_yh2)?;

    set_site_instr(session, &s_h1x, to_y)?;
    set_site_instr(session, &s_h2y, to_x)?;
    set_site_instr(session, &s_xh1, to_h2)?;
    set_site_instr(session, &s_yh2, to_h1)?;

    graph.edges.insert((h1, y), s_h1x);
    graph.edges.insert((h2, x), s_h2y);
    graph.edges.insert((x, h2), s_xh1);
    graph.edges.insert((y, h1), s_yh2);
    Ok(())
}

/// Pulls a 2-exit passage out of the graph (stitching its neighbours
/// together) and splices it between `hub` and `next`.
pub fn move_passage(
    session: &mut Session,
    graph: &mut ForestGraph,
    passage: u16,
    hub: u16,
    next: u16,
) -> Result<(), ShuffleError> {
    let exits = graph.neighbours(passage);
    let [x, y] = exits[..] else {
        return Err(ShuffleError::Custom(format!(
            "forest room {passage} is not a 2-exit passage"
        )));
    };
    // Stitching would create a parallel edge if the neighbours already
    // touch; leave such a passage where it is.
    if graph.edges.contains_key(&(x, y)) {
        log::warn!("passage {passage} sits on an already-connected pair, leaving it");
        return Ok(());
    }

    let s_px = graph.take((passage, x))?;
    let s_py = graph.take((passage, y))?;
    let s_xp = graph.take((x, passage))?;
    let s_yp = graph.take((y, passage))?;
    let s_hn = graph.take((hub, next))?;
    let s_nh = graph.take((next, hub))?;

    let to_x = site_instr(session, &s_px)?;
    let to_y = site_instr(session, &s_py)?;
    let to_p_a = site_instr(session, &s_xp)?;
    let to_p_b = site_instr(session, &s_yp)?;
    let to_n = site_instr(session, &s_hn)?;
    let to_hub = site_instr(session, &s_nh)?;

    // Stitch the passage's old neighbours directly together.
    set_site_instr(session, &s_xp, to_y)?;
    set_site_instr(session, &s_yp, to_x)?;
    // Route hub and its old neighbour through the passage.
    set_site_instr(session, &s_hn, to_p_a)?;
    set_site_instr(session, &s_nh, to_p_b)?;
    set_site_instr(session, &s_px, to_n)?;
    set_site_instr(session, &s_py, to_hub)?;

    graph.edges.insert((x, y), s_xp);
    graph.edges.insert((y, x), s_yp);
    graph.edges.insert((hub, passage), s_hn);
    graph.edges.insert((next, passage), s_nh);
    graph.edges.insert((passage, next), s_px);
    graph.edges.insert((passage, hub), s_py);
    Ok(())
}

/// Forest shuffle: rotate exit sets between the 3-way hub subrooms, then
/// relocate every 2-way passage. The four outer-world exits never move.
pub fn shuffle_forest(session: &mut Session, rng: &mut StdRng) -> Result<(), ShuffleError> {
    let mut graph = extract_forest_graph(session);
    if graph.edges.is_empty() {
        log::warn!("no forest links found, nothing to shuffle");
        return Ok(());
    }

    let rooms: BTreeSet<u16> = graph.edges.keys().map(|(src, _)| *src).collect();
    let mut hub_ids: Vec<u16> = rooms
        .iter()
        .copied()
        .filter(|&r| graph.neighbours(r).len() == 3)
        .collect();
    let passages: Vec<u16> = rooms
        .iter()
        .copied()
        .filter(|&r| graph.neighbours(r).len() == 2)
        .collect();
    log::info!(
        "forest: {} hubs, {} passages, {} edges",
        hub_ids.len(),
        passages.len(),
        graph.edges.len()
    );

    hub_ids.shuffle(rng);
    for i in 0..hub_ids.len().saturating_sub(1) {
        let (h1, h2) = (hub_ids[i], hub_ids[i + 1]);
        let mut a_exits = graph.neighbours(h1);
        let mut b_exits = graph.neighbours(h2);
        // A direct edge between the two hubs stays where it is.
        if a_exits.contains(&h2) && b_exits.contains(&h1) {
            a_exits.retain(|&v| v != h2);
            b_exits.retain(|&v| v != h1);
        }
        b_exits.shuffle(rng);
        // Only paired exits take part; a lopsided pairing would leak a
        // pooled edge back over a freshly swapped one.
        let paired = a_exits.len().min(b_exits.len());
        a_exits.truncate(paired);
        b_exits.truncate(paired);
        // Both hubs' edges leave the graph before any pair is swapped.
        let mut pool: BTreeMap<(u16, u16), ForestSite> = BTreeMap::new();
        for &x in &a_exits {
            pool.insert((h1, x), graph.take((h1, x))?);
            pool.insert((x, h1), graph.take((x, h1))?);
        }
        for &y in &b_exits {
            pool.insert((h2, y), graph.take((h2, y))?);
            pool.insert((y, h2), graph.take((y, h2))?);
        }
        for (&x, &y) in a_exits.iter().zip(b_exits.iter()) {
            forest_room_link_swap(session, &mut graph, &mut pool, (h1, x), (h2, y))?;
        }
        // Unpaired exits (uneven hubs) go back untouched.
        for (key, site) in pool {
            graph.edges.insert(key, site);
        }
    }

    for &passage in &passages {
        let hub_pool: Vec<u16> = hub_ids
            .iter()
            .copied()
            .filter(|&h| h != passage && !graph.neighbours(h).is_empty())
            .collect();
        if hub_pool.is_empty() {
            log::warn!("no hub available to splice passage {passage} onto");
            continue;
        }
        let hub = hub_pool[rng.gen_range(0..hub_pool.len())];
        let candidates: Vec<u16> = graph
            .neighbours(hub)
            .into_iter()
            .filter(|&n| n != passage)
            .collect();
        if candidates.is_empty() {
            log::warn!("hub {hub} has no neighbour to splice passage {passage} against");
            continue;
        }
        let next = candidates[rng.gen_range(0..candidates.len())];
        move_passage(session, &mut graph, passage, hub, next)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::links::generate_room_linkmap;
    use crate::testutil::{build_archives, room_with_exits, RoomSpec};

    fn toy_world() -> Session {
        let rooms = vec![
            room_with_exits(33, "dock", &[34, 35, 28]),
            room_with_exits(34, "high", &[33, 29]),
            room_with_exits(35, "low", &[33, 41]),
            room_with_exits(28, "bar", &[33]),
            room_with_exits(29, "church", &[34]),
            room_with_exits(41, "jail", &[35]),
        ];
        Session::from_archives(build_archives(rooms)).unwrap()
    }

    #[test]
    fn extraction_sees_every_pair() {
        let session = toy_world();
        let links = generate_room_links(&session);
        assert_eq!(links.len(), 5);
        let linkmap = generate_room_linkmap(&links);
        assert_eq!(linkmap[&33].len(), 3);
        assert_eq!(linkmap[&28].len(), 1);
    }

    #[test]
    fn snippets_capture_the_exit_instruction() {
        let session = toy_world();
        let links = generate_room_links(&session);
        let snippets = collect_snippets(&session, &links);
        let snippet = &snippets[&(33, 34)];
        assert_eq!(snippet.len(), 1);
        assert_eq!(snippet[0].1.op.room_target(), Some(34));
    }

    #[test]
    fn shuffle_keeps_the_world_connected() {
        let mut session = toy_world();
        let mut rng = StdRng::seed_from_u64(1);
        shuffle_rooms(&mut session, &mut rng).unwrap();

        let links = generate_room_links(&session);
        let linkmap = generate_room_linkmap(&links);
        let reachable = find_room_cluster(&linkmap, ORIGIN_ROOM);
        for room in [33u16, 34, 35, 28, 29, 41] {
            assert!(reachable.contains(&room), "room {room} unreachable");
        }
    }

    #[test]
    fn shuffle_is_deterministic() {
        let run = |seed: u64| {
            let mut session = toy_world();
            let mut rng = StdRng::seed_from_u64(seed);
            shuffle_rooms(&mut session, &mut rng).unwrap();
            session.archives.disks[0].write()
        };
        assert_eq!(run(7), run(7));
        assert_eq!(run(1), run(1));
    }

    // ----- forest -----

    /// isEqual(VAR_ROOM, src) guarding a loadRoomWithEgo(dest) per edge.
    fn forest_dispatcher(edges: &[(u16, u16)]) -> Vec<u8> {
        let mut code = Vec::new();
        for &(src, dest) in edges {
            code.push(0x48);
            code.extend_from_slice(&4u16.to_le_bytes());
            code.extend_from_slice(&(src as i16).to_le_bytes());
            code.extend_from_slice(&8i16.to_le_bytes());
            code.push(0x24);
            code.extend_from_slice(&(600 + dest as i16).to_le_bytes());
            code.push(dest as u8);
            code.extend_from_slice(&10i16.to_le_bytes());
            code.extend_from_slice(&20i16.to_le_bytes());
        }
        code.push(0x00);
        code
    }

    /// Two 3-way hubs joined by three parallel passages, plus one fixed
    /// exit back to the outer world.
    fn forest_world() -> (Session, Vec<(u16, u16)>) {
        let edges = vec![
            (201, 204),
            (204, 201),
            (201, 205),
            (205, 201),
            (201, 208),
            (208, 201),
            (206, 204),
            (204, 206),
            (206, 205),
            (205, 206),
            (206, 208),
            (208, 206),
            (201, 58),
        ];
        let spec = RoomSpec {
            id: 61,
            name: Some("forest"),
            objects: vec![(700, vec![(10, forest_dispatcher(&edges))])],
            ..RoomSpec::default()
        };
        let session = Session::from_archives(build_archives(vec![spec])).unwrap();
        (session, edges)
    }

    fn forest_rooms_connected(graph: &ForestGraph) -> bool {
        let rooms: BTreeSet<u16> = graph.edges.keys().map(|(src, _)| *src).collect();
        let Some(&start) = rooms.iter().next() else {
            return true;
        };
        let mut seen = BTreeSet::from([start]);
        let mut pending = vec![start];
        while let Some(room) = pending.pop() {
            for next in graph.neighbours(room) {
                if seen.insert(next) {
                    pending.push(next);
                }
            }
        }
        seen.len() == rooms.len()
    }

    #[test]
    fn forest_extraction_ignores_outer_edges() {
        let (session, _) = forest_world();
        let graph = extract_forest_graph(&session);
        assert_eq!(graph.edges.len(), 12);
        assert!(graph.edges.keys().all(|&(src, dest)| {
            src >= FOREST_BASE && dest >= FOREST_BASE
        }));
        assert_eq!(graph.neighbours(201).len(), 3);
        assert_eq!(graph.neighbours(204).len(), 2);
    }

    #[test]
    fn forest_shuffle_preserves_shape_and_outer_exits() {
        let (mut session, _) = forest_world();
        let mut rng = StdRng::seed_from_u64(1);
        shuffle_forest(&mut session, &mut rng).unwrap();

        let graph = extract_forest_graph(&session);
        assert_eq!(graph.edges.len(), 12);
        assert_eq!(graph.neighbours(201).len(), 3, "201 is still a hub");
        assert_eq!(graph.neighbours(206).len(), 3, "206 is still a hub");
        for passage in [204u16, 205, 208] {
            assert_eq!(
                graph.neighbours(passage).len(),
                2,
                "{passage} is still a passage"
            );
        }
        assert!(forest_rooms_connected(&graph));

        // the outer-world exit is untouched
        let verb = session
            .room(61)
            .unwrap()
            .objects[&700]
            .verb(10)
            .unwrap();
        let outer: Vec<i32> = verb
            .iter()
            .filter_map(|(_, instr)| instr.op.room_target())
            .filter(|&dest| (dest as u16) < FOREST_BASE)
            .collect();
        assert_eq!(outer, vec![58]);
    }

    #[test]
    fn forest_shuffle_is_deterministic() {
        let run = |seed: u64| {
            let (mut session, _) = forest_world();
            let mut rng = StdRng::seed_from_u64(seed);
            shuffle_forest(&mut session, &mut rng).unwrap();
            session.archives.disks[0].write()
        };
        assert_eq!(run(3), run(3));
    }
}
