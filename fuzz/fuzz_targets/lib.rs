#[derive(Debug)]
pub enum CacheOperation {
    Add(u8, u8),
    Get(u8),
    Peek(u8),
    Remove(u8),
    RemoveOldest,
    Clear,
    GetOrAddWith(u8, u8),
    Keys,
    ToggleCallback,
}

impl<'a> arbitrary::Arbitrary<'a> for CacheOperation {
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        match u.int_in_range(0..=8)? {
            0 => Ok(CacheOperation::Add(u.arbitrary()?, u.arbitrary()?)),
            1 => Ok(CacheOperation::Get(u.arbitrary()?)),
            2 => Ok(CacheOperation::Peek(u.arbitrary()?)),
            3 => Ok(CacheOperation::Remove(u.arbitrary()?)),
            4 => Ok(CacheOperation::RemoveOldest),
            5 => Ok(CacheOperation::Clear),
            6 => Ok(CacheOperation::GetOrAddWith(u.arbitrary()?, u.arbitrary()?)),
            7 => Ok(CacheOperation::Keys),
            8 => Ok(CacheOperation::ToggleCallback),
            _ => unreachable!(),
        }
    }
}
