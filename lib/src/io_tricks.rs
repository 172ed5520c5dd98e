/// Either a transform-wrapped reader or the plain one, without boxing.
/// The disk archives come through an XOR wrapper, the master index does not.
#[auto_enums::enum_derive(Read)]
pub enum ReadMixer<L, R> {
    Wrapped(L),
    Plain(R),
}
