use crate::script::text::TextToken;
use crate::script::var::{VarRef, VAR_EGO};

/// A positional argument, recording how it was encoded. The per-opcode
/// argument-source bits are reconstructed from the variant on re-encode.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Operand {
    Var(VarRef),
    Imm(i32),
}

impl Operand {
    pub fn is_var(&self) -> bool {
        matches!(self, Operand::Var(_))
    }

    pub fn as_imm(&self) -> Option<i32> {
        match self {
            Operand::Imm(v) => Some(*v),
            Operand::Var(_) => None,
        }
    }

    pub fn as_var(&self) -> Option<VarRef> {
        match self {
            Operand::Var(v) => Some(*v),
            Operand::Imm(_) => None,
        }
    }
}

/// `actorOps` sub-operations, after the interpreter's remap table.
#[derive(Clone, Debug, PartialEq)]
pub enum ActorOp {
    Dummy(Operand),
    Costume(Operand),
    StepDist(Operand, Operand),
    Sound(Operand),
    WalkAnimation(Operand),
    TalkAnimation(Operand, Operand),
    StandAnimation(Operand),
    Animation(Operand, Operand, Operand),
    Default,
    Elevation(Operand),
    AnimationDefault,
    Palette(Operand, Operand),
    TalkColor(Operand),
    Name(Vec<TextToken>),
    InitAnimation(Operand),
    Width(Operand),
    Scale(Operand),
    NeverZClip,
    AlwaysZClip(Operand),
    IgnoreBoxes,
    FollowBoxes,
    AnimationSpeed(Operand),
    Shadow(Operand),
    Unknown,
}

#[derive(Clone, Debug, PartialEq)]
pub enum RoomOp {
    Scroll(Operand, Operand),
    Color(Operand, Operand),
    Screen(Operand, Operand),
    Palette(Operand, Operand),
    ShakeOn,
    ShakeOff,
    Scale(Operand, Operand, Operand, Operand, Operand),
    Intensity(Operand, Operand, Operand),
    SaveGame(Operand, Operand),
    Fade(Operand),
    RgbIntensity(Operand, Operand, Operand, Operand, Operand),
    Shadow(Operand, Operand, Operand, Operand, Operand),
    SaveString,
    LoadString,
    Transform(Operand, Operand, Operand, Operand),
    CycleSpeed(Operand, Operand),
    Unknown,
}

#[derive(Clone, Debug, PartialEq)]
pub enum CursorOp {
    CursorOn,
    CursorOff,
    UserputOn,
    UserputOff,
    CursorSoftOn,
    CursorSoftOff,
    UserputSoftOn,
    UserputSoftOff,
    CursorImage(Operand, Operand),
    CursorHotspot(Operand, Operand, Operand),
    CursorSet(Operand),
    CharsetSet(Operand),
    CharsetColors(Vec<Operand>),
    Unknown,
}

#[derive(Clone, Debug, PartialEq)]
pub enum MatrixOp {
    SetBoxFlags(Operand, Operand),
    SetBoxScale(Operand, Operand),
    SetBoxScaleAlt(Operand, Operand),
    CreateBoxMatrix,
    Unknown,
}

/// `stringOps` (opcode 0x27) sub-operations.
#[derive(Clone, Debug, PartialEq)]
pub enum StringOp {
    LoadString {
        index: Operand,
        string: Vec<TextToken>,
    },
    CopyString {
        a: Operand,
        b: Operand,
    },
    SetStringChar {
        a: Operand,
        b: Operand,
        c: Operand,
    },
    GetStringChar {
        target: VarRef,
        a: Operand,
        b: Operand,
    },
    CreateString {
        a: Operand,
        b: Operand,
    },
    Unknown,
}

/// Layout/placement sub-operations inside the print family. A `Text`
/// entry terminates the list on the wire; otherwise a 0xFF sentinel does.
#[derive(Clone, Debug, PartialEq)]
pub enum PrintOp {
    At(Operand, Operand),
    Color(Operand),
    Clipped(Operand),
    Erase(Operand, Operand),
    Center,
    Left,
    Overhead,
    SayVoice(Operand, Operand),
    Text(Vec<TextToken>),
    Unknown,
}

#[derive(Clone, Debug, PartialEq)]
pub enum VerbOp {
    Image(Operand),
    Name(Vec<TextToken>),
    Color(Operand),
    HiColor(Operand),
    At(Operand, Operand),
    On,
    Off,
    Delete,
    New,
    DimColor(Operand),
    Dim,
    Key(Operand),
    Center,
    NameStr(Operand),
    AssignObject(Operand, Operand),
    BackColor(Operand),
    Unknown,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VerbRangeOp {
    Save,
    Restore,
    Delete,
    Unknown,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SystemOp {
    Restart,
    Pause,
    Quit,
    Unknown,
}

#[derive(Clone, Debug, PartialEq)]
pub enum WaitOp {
    ForActor(Operand),
    ForMessage,
    ForCamera,
    ForSentence,
    Unknown,
}

/// RPN token inside an `expression` instruction. Case 6 nests a whole
/// instruction whose result feeds the stack.
#[derive(Clone, Debug, PartialEq)]
pub enum ExprTok {
    Operand(Operand),
    Add,
    Sub,
    Mul,
    Div,
    Instr(Box<Instr>),
}

/// One decoded V4 instruction. All colours of an opcode collapse into a
/// single variant; the argument sources live in the `Operand`s.
#[derive(Clone, Debug, PartialEq)]
#[allow(clippy::large_enum_variant)]
pub enum Op {
    StopObjectCode,
    PutActor { act: Operand, x: Operand, y: Operand },
    StartMusic { cmd: Operand },
    GetActorRoom { target: VarRef, act: Operand },
    IsGreaterEqual { a: VarRef, b: Operand, offset: i16 },
    DrawObject { obj: Operand, x: Operand, y: Operand },
    GetActorElevation { target: VarRef, act: Operand },
    SetState { obj: Operand, state: Operand },
    IsNotEqual { a: VarRef, b: Operand, offset: i16 },
    FaceActor { act: Operand, obj: Operand },
    StartScript { script: Operand, args: Vec<Operand>, recursive: bool, freeze_resistant: bool },
    GetVerbEntrypoint { obj: Operand, entry: Operand },
    ResourceRoutines { op: u8, resid: Option<Operand>, resid2: Option<Operand>, resid3: Option<Operand> },
    WalkActorToActor { nr: Operand, nr2: Operand, dist: u8 },
    PutActorAtObject { act: Operand, obj: Operand },
    IfState { obj: Operand, val: Operand, offset: i16 },
    GetObjectOwner { target: VarRef, obj: Operand },
    AnimateActor { act: Operand, anim: Operand },
    PanCameraTo { x: Operand },
    ActorOps { act: Operand, ops: Vec<ActorOp> },
    Print { act: Operand, ops: Vec<PrintOp> },
    ActorFromPos { target: VarRef, x: Operand, y: Operand },
    GetRandomNr { target: VarRef, max: Operand },
    And { target: VarRef, a: Operand },
    JumpRelative { offset: i16 },
    DoSentence { verb: Operand, obj_a: Option<Operand>, obj_b: Option<Operand> },
    Move { target: VarRef, value: Operand },
    Multiply { target: VarRef, a: Operand },
    StartSound { sound: Operand },
    IfClassOfIs { obj: Operand, classes: Vec<Operand>, offset: i16 },
    WalkActorTo { act: Operand, x: Operand, y: Operand },
    IsActorInBox { act: Operand, box_id: Operand, offset: i16 },
    StopMusic,
    SaveLoadGame { target: VarRef, op: Operand },
    GetActorY { target: VarRef, act: Operand },
    LoadRoomWithEgo { obj: Operand, room: Operand, x: i16, y: i16 },
    SetVarRange { target: VarRef, values: Vec<i32>, use_words: bool },
    StringOps(StringOp),
    EqualZero { a: VarRef, offset: i16 },
    SetOwner { obj: Operand, owner: Operand },
    DelayVariable { var: VarRef },
    CursorCommand(CursorOp),
    PutActorInRoom { act: Operand, room: Operand },
    Delay { delay: u32 },
    IfNotState { obj: Operand, val: Operand, offset: i16 },
    MatrixOps(MatrixOp),
    GetInventoryCount { target: VarRef, owner: Operand },
    SetCameraAt { x_pos: Operand },
    RoomOps(RoomOp),
    GetDist { target: VarRef, obj_a: Operand, obj_b: Operand },
    FindObject { target: VarRef, x: Operand, y: Operand },
    WalkActorToObject { act: Operand, obj: Operand },
    StartObject { obj: Operand, script: Operand, args: Vec<Operand> },
    IsLessEqual { a: VarRef, b: Operand, offset: i16 },
    Subtract { target: VarRef, a: Operand },
    GetActorScale { act: Operand },
    StopSound { sound: Operand },
    FindInventory { target: VarRef, x: Operand, y: Operand },
    DrawBox { x: Operand, y: Operand, x2: Operand, y2: Operand, color: Operand },
    Cutscene { args: Vec<Operand> },
    ChainScript { script: Operand, args: Vec<Operand> },
    GetActorX { target: VarRef, act: Operand },
    IsLess { a: VarRef, b: Operand, offset: i16 },
    Increment { target: VarRef },
    IsEqual { a: VarRef, b: Operand, offset: i16 },
    PickupObject { obj: Operand },
    ActorFollowCamera { act: Operand },
    SetObjectName { obj: Operand, name: Vec<TextToken> },
    GetActorMoving { target: VarRef, act: Operand },
    Or { target: VarRef, a: Operand },
    BeginOverride,
    EndOverride,
    Add { target: VarRef, a: Operand },
    Divide { target: VarRef, a: Operand },
    OldRoomEffect { op: u8, effect: Option<Operand> },
    SetClass { obj: Operand, cls: Vec<Operand> },
    FreezeScripts { scr: Operand },
    StopScript { idx: Operand },
    GetActorFacing { target: VarRef, act: Operand },
    IsScriptRunning { target: VarRef, idx: Operand },
    GetActorWidth { target: VarRef, act: Operand },
    Lights { lights: Operand, x_strips: u8, y_strips: u8 },
    GetActorCostume { target: VarRef, act: Operand },
    LoadRoom { room: Operand },
    IsGreater { a: VarRef, b: Operand, offset: i16 },
    VerbOps { verb: Operand, ops: Vec<VerbOp> },
    GetActorWalkBox { target: VarRef, act: Operand },
    IsSoundRunning { target: VarRef, snd: Operand },
    BreakHere,
    SystemOps(SystemOp),
    NotEqualZero { a: VarRef, offset: i16 },
    SaveRestoreVerbs { op: VerbRangeOp, verb_start: Operand, verb_end: Operand, save_id: Operand },
    Expression { target: VarRef, expr: Vec<ExprTok> },
    Wait(WaitOp),
    EndCutscene,
    Decrement { target: VarRef },
    PseudoRoom { val: u8, sources: Vec<u8> },
    PrintEgo { ops: Vec<PrintOp> },
    Unknown { opcode: u8 },
}

impl Op {
    /// Relative branch field, for the instructions that carry one.
    pub fn branch_offset(&self) -> Option<i16> {
        match self {
            Op::IsGreaterEqual { offset, .. }
            | Op::IsNotEqual { offset, .. }
            | Op::IsLessEqual { offset, .. }
            | Op::IsLess { offset, .. }
            | Op::IsEqual { offset, .. }
            | Op::IsGreater { offset, .. }
            | Op::IfState { offset, .. }
            | Op::IfNotState { offset, .. }
            | Op::IfClassOfIs { offset, .. }
            | Op::IsActorInBox { offset, .. }
            | Op::EqualZero { offset, .. }
            | Op::NotEqualZero { offset, .. }
            | Op::JumpRelative { offset } => Some(*offset),
            _ => None,
        }
    }

    pub fn set_branch_offset(&mut self, new_offset: i16) {
        match self {
            Op::IsGreaterEqual { offset, .. }
            | Op::IsNotEqual { offset, .. }
            | Op::IsLessEqual { offset, .. }
            | Op::IsLess { offset, .. }
            | Op::IsEqual { offset, .. }
            | Op::IsGreater { offset, .. }
            | Op::IfState { offset, .. }
            | Op::IfNotState { offset, .. }
            | Op::IfClassOfIs { offset, .. }
            | Op::IsActorInBox { offset, .. }
            | Op::EqualZero { offset, .. }
            | Op::NotEqualZero { offset, .. }
            | Op::JumpRelative { offset } => *offset = new_offset,
            _ => {}
        }
    }

    /// The immediate destination room for the two instruction shapes that
    /// move the player between rooms. `putActorInRoom` only counts when it
    /// targets the player actor.
    pub fn room_target(&self) -> Option<i32> {
        match self {
            Op::LoadRoomWithEgo { room, .. } => room.as_imm(),
            Op::PutActorInRoom { act, room } => match act.as_var() {
                Some(v) if v.id == VAR_EGO => room.as_imm(),
                _ => None,
            },
            _ => None,
        }
    }
}

/// A decoded instruction plus the exact bytes it came from. `raw` is
/// authoritative on re-encode until a mutator touches the instruction;
/// synthetic instructions start with an empty `raw`.
#[derive(Clone, Debug, PartialEq)]
pub struct Instr {
    pub opcode: u8,
    pub op: Op,
    pub raw: Vec<u8>,
}

impl Instr {
    pub fn synthetic(opcode: u8, op: Op) -> Self {
        Self {
            opcode,
            op,
            raw: Vec::new(),
        }
    }

    /// Edits the operation and drops the cached raw bytes so the encoder
    /// re-derives the wire form.
    pub fn modify(&mut self, f: impl FnOnce(&mut Op)) {
        f(&mut self.op);
        self.raw.clear();
    }

    pub fn is_nop(&self) -> bool {
        matches!(self.op, Op::JumpRelative { offset: 0 })
    }
}

/// The canonical do-nothing used to blank instructions in place: a
/// relative jump of zero. Blanking keeps every later instruction index
/// stable, so sibling branches inside the script stay patchable.
pub fn nop() -> Instr {
    Instr::synthetic(0x18, Op::JumpRelative { offset: 0 })
}

/// A decoded script: `(byte offset, instruction)` in stream order.
pub type Script = Vec<(usize, Instr)>;
