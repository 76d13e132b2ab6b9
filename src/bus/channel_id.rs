use std::{
    fmt,
    hash::{Hash, Hasher},
    str::FromStr,
    sync::Arc,
};

use channelbus_error::{ChannelIdError, InvalidIdReason};

const SINGLE_WILD: &str = "*";
const DEEP_WILD: &str = "**";

/// Вид идентификатора канала.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    /// Обычный канал без шаблона.
    Exact,
    /// Последний сегмент `*`: ровно один уровень.
    WildOne,
    /// Последний сегмент `**`: этот уровень и все уровни ниже.
    WildDeep,
    /// `/**`: совпадает с любым каналом.
    WildRoot,
}

/// Идентификатор канала, разобранный один раз из строки пути.
///
/// Неизменяем после создания. Равенство и хеш определяются строкой пути,
/// которая однозначно задаёт сегменты и вид.
#[derive(Clone)]
pub struct ChannelId {
    id: Arc<str>,
    segments: Arc<[Box<str>]>,
    kind: ChannelKind,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl ChannelId {
    /// Разбирает строку вида `/seg1/seg2/.../segN`.
    ///
    /// Сегменты непусты, `*` и `**` допустимы только как целый последний
    /// сегмент.
    pub fn parse(id: &str) -> Result<Self, ChannelIdError> {
        if id.is_empty() {
            return Err(ChannelIdError::invalid(id, InvalidIdReason::Empty));
        }
        let Some(rest) = id.strip_prefix('/') else {
            return Err(ChannelIdError::invalid(
                id,
                InvalidIdReason::MissingLeadingSlash,
            ));
        };

        let segments: Vec<&str> = rest.split('/').collect();
        let last = segments.len() - 1;

        for (i, segment) in segments.iter().enumerate() {
            if segment.is_empty() {
                return Err(ChannelIdError::invalid(id, InvalidIdReason::EmptySegment));
            }
            let is_wild = *segment == SINGLE_WILD || *segment == DEEP_WILD;
            if is_wild && i != last {
                return Err(ChannelIdError::invalid(
                    id,
                    InvalidIdReason::MisplacedWildcard,
                ));
            }
            if !is_wild && segment.contains('*') {
                return Err(ChannelIdError::invalid(
                    id,
                    InvalidIdReason::PartialWildcard,
                ));
            }
        }

        Ok(Self::from_segments(
            segments.into_iter().map(Box::<str>::from).collect(),
        ))
    }

    /// Собирает идентификатор из уже проверенных сегментов.
    fn from_segments(segments: Vec<Box<str>>) -> Self {
        let kind = match segments.last().map(|s| &**s) {
            Some(DEEP_WILD) if segments.len() == 1 => ChannelKind::WildRoot,
            Some(DEEP_WILD) => ChannelKind::WildDeep,
            Some(SINGLE_WILD) => ChannelKind::WildOne,
            _ => ChannelKind::Exact,
        };
        let mut id = String::new();
        for segment in &segments {
            id.push('/');
            id.push_str(segment);
        }
        Self {
            id: Arc::from(id),
            segments: segments.into(),
            kind,
        }
    }

    /// Строковое представление идентификатора.
    pub fn as_str(&self) -> &str {
        &self.id
    }

    /// Общий ключ строки пути (без копирования).
    pub(crate) fn as_arc_str(&self) -> Arc<str> {
        self.id.clone()
    }

    pub fn segments(&self) -> impl ExactSizeIterator<Item = &str> {
        self.segments.iter().map(|s| &**s)
    }

    /// Сегмент по индексу (с нуля).
    pub fn segment(
        &self,
        index: usize,
    ) -> Option<&str> {
        self.segments.get(index).map(|s| &**s)
    }

    /// Количество сегментов.
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    /// `true` для любого шаблона (`*`, `**`, `/**`).
    pub fn is_wild(&self) -> bool {
        self.kind != ChannelKind::Exact
    }

    /// `true` для многоуровневых шаблонов, включая `/**`.
    pub fn is_deep_wild(&self) -> bool {
        matches!(self.kind, ChannelKind::WildDeep | ChannelKind::WildRoot)
    }

    /// Служебные каналы протокола: `/meta/...`.
    pub fn is_meta(&self) -> bool {
        &*self.segments[0] == "meta"
    }

    /// Сервисные каналы: `/service/...`.
    pub fn is_service(&self) -> bool {
        &*self.segments[0] == "service"
    }

    /// Широковещательный канал: не служебный и не сервисный.
    pub fn is_broadcast(&self) -> bool {
        !self.is_meta() && !self.is_service()
    }

    /// Родительский идентификатор: путь без последнего сегмента.
    ///
    /// У каналов первого уровня (включая `/*` и `/**`) родителя нет.
    pub fn parent(&self) -> Option<ChannelId> {
        if self.depth() < 2 {
            return None;
        }
        Some(Self::from_segments(
            self.segments[..self.depth() - 1].to_vec(),
        ))
    }

    /// Проверяет, подходит ли `candidate` под этот идентификатор как под
    /// шаблон.
    pub fn matches(
        &self,
        candidate: &ChannelId,
    ) -> bool {
        match self.kind {
            ChannelKind::WildRoot => true,
            ChannelKind::Exact => self.segments == candidate.segments,
            ChannelKind::WildOne => {
                candidate.depth() == self.depth() && self.same_prefix(candidate)
            }
            ChannelKind::WildDeep => {
                candidate.depth() >= self.depth() && self.same_prefix(candidate)
            }
        }
    }

    /// Все шаблоны, под которые подходит этот идентификатор, от самого
    /// конкретного к самому общему; `/**` всегда последний.
    ///
    /// Для `/a/b/c`: `/a/b/*`, `/a/b/**`, `/a/**`, `/**`. Для шаблона
    /// возвращает пустой список.
    pub fn wilds(&self) -> Vec<ChannelId> {
        if self.is_wild() {
            return Vec::new();
        }

        let depth = self.depth();
        let mut wilds = Vec::with_capacity(depth + 1);
        wilds.push(self.with_wild(depth - 1, SINGLE_WILD));
        for level in (0..depth).rev() {
            wilds.push(self.with_wild(level, DEEP_WILD));
        }
        wilds
    }

    /// Первые `len` сегментов с добавленным шаблоном в конце.
    fn with_wild(
        &self,
        len: usize,
        wild: &str,
    ) -> ChannelId {
        let mut segments = self.segments[..len].to_vec();
        segments.push(Box::from(wild));
        Self::from_segments(segments)
    }

    /// Совпадают ли все сегменты шаблона перед последним.
    fn same_prefix(
        &self,
        candidate: &ChannelId,
    ) -> bool {
        let len = self.depth() - 1;
        candidate.depth() >= len && self.segments[..len] == candidate.segments[..len]
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl PartialEq for ChannelId {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        self.id == other.id
    }
}

impl Eq for ChannelId {}

impl Hash for ChannelId {
    fn hash<H: Hasher>(
        &self,
        state: &mut H,
    ) {
        self.id.hash(state);
    }
}

impl fmt::Debug for ChannelId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_tuple("ChannelId").field(&self.id).finish()
    }
}

impl fmt::Display for ChannelId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(&self.id)
    }
}

impl FromStr for ChannelId {
    type Err = ChannelIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<&str> for ChannelId {
    type Error = ChannelIdError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl AsRef<str> for ChannelId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> ChannelId {
        ChannelId::parse(s).unwrap()
    }

    fn matches(
        pattern: &str,
        candidate: &str,
    ) -> bool {
        id(pattern).matches(&id(candidate))
    }

    /// Тест проверяет разбор сегментов и определение вида.
    #[test]
    fn test_parse_segments_and_kind() {
        let foo_bar = id("/foo/bar");
        assert_eq!(foo_bar.segments().collect::<Vec<_>>(), vec!["foo", "bar"]);
        assert_eq!(foo_bar.depth(), 2);
        assert_eq!(foo_bar.kind(), ChannelKind::Exact);

        assert_eq!(id("/foo/*").kind(), ChannelKind::WildOne);
        assert_eq!(id("/foo/**").kind(), ChannelKind::WildDeep);
        assert_eq!(id("/**").kind(), ChannelKind::WildRoot);
        assert_eq!(id("/*").kind(), ChannelKind::WildOne);
        assert!(id("/**").is_deep_wild());
        assert!(!id("/foo/*").is_deep_wild());
    }

    /// Тест проверяет отказ для некорректных идентификаторов.
    #[test]
    fn test_parse_rejects_malformed_ids() {
        let cases = [
            ("", InvalidIdReason::Empty),
            ("foo/bar", InvalidIdReason::MissingLeadingSlash),
            ("/", InvalidIdReason::EmptySegment),
            ("/foo//bar", InvalidIdReason::EmptySegment),
            ("/foo/", InvalidIdReason::EmptySegment),
            ("/foo/*/bar", InvalidIdReason::MisplacedWildcard),
            ("/**/foo", InvalidIdReason::MisplacedWildcard),
            ("/foo/b*r", InvalidIdReason::PartialWildcard),
            ("/foo/***", InvalidIdReason::PartialWildcard),
        ];
        for (raw, reason) in cases {
            let err = ChannelId::parse(raw).unwrap_err();
            assert_eq!(err.reason(), reason, "id {raw:?}");
        }
    }

    /// Тест проверяет базовые правила сопоставления шаблонов.
    #[test]
    fn test_wildcard_matching() {
        assert!(matches("/foo/*", "/foo/bar"));
        assert!(!matches("/foo/*", "/foo/bar/baz"));
        assert!(!matches("/foo/*", "/foo"));
        assert!(matches("/foo/**", "/foo/bar/baz"));
        assert!(matches("/foo/**", "/foo/bar"));
        assert!(!matches("/foo/**", "/foo"));
        assert!(!matches("/foo/**", "/bar/baz"));
        assert!(matches("/**", "/anything/at/all"));
        assert!(matches("/**", "/x"));
        assert!(matches("/*", "/x"));
        assert!(!matches("/*", "/x/y"));
    }

    /// Тест проверяет, что точный идентификатор совпадает только сам с собой.
    #[test]
    fn test_exact_matching() {
        assert!(matches("/foo/bar", "/foo/bar"));
        assert!(!matches("/foo/bar", "/foo/baz"));
        assert!(!matches("/foo/bar", "/foo/bar/baz"));
    }

    /// Тест проверяет порядок шаблонов: от конкретного к общему.
    #[test]
    fn test_wilds_order() {
        let wilds: Vec<String> = id("/a/b/c")
            .wilds()
            .into_iter()
            .map(|w| w.to_string())
            .collect();
        assert_eq!(wilds, vec!["/a/b/*", "/a/b/**", "/a/**", "/**"]);

        let top: Vec<String> = id("/a").wilds().into_iter().map(|w| w.to_string()).collect();
        assert_eq!(top, vec!["/*", "/**"]);

        assert!(id("/a/*").wilds().is_empty());
    }

    /// Тест проверяет, что каждый шаблон из `wilds` действительно совпадает.
    #[test]
    fn test_every_wild_matches_origin() {
        let origin = id("/a/b/c/d");
        for wild in origin.wilds() {
            assert!(wild.matches(&origin), "{wild} must match {origin}");
        }
    }

    /// Тест проверяет вычисление родителя.
    #[test]
    fn test_parent() {
        assert_eq!(id("/foo/bar").parent(), Some(id("/foo")));
        assert_eq!(id("/foo/*").parent(), Some(id("/foo")));
        assert_eq!(id("/foo/bar/**").parent(), Some(id("/foo/bar")));
        assert_eq!(id("/foo").parent(), None);
        assert_eq!(id("/**").parent(), None);
    }

    #[test]
    fn test_meta_and_service() {
        assert!(id("/meta/connect").is_meta());
        assert!(id("/service/echo").is_service());
        assert!(id("/chat/room").is_broadcast());
        assert!(!id("/meta/handshake").is_broadcast());
    }

    #[test]
    fn test_equality_and_from_str() {
        let a: ChannelId = "/foo/bar".parse().unwrap();
        let b = ChannelId::try_from("/foo/bar").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "/foo/bar");
        assert_eq!(a.segment(1), Some("bar"));
        assert_eq!(a.segment(2), None);
    }
}
