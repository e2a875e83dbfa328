// SPDX-License-Identifier: GPL-3.0-only

//! Shared fakes for integration tests

#![allow(dead_code)]

use card_scanner::backends::recognition::{
    CardPrices, EncodedImage, ImageUris, Recognition, RecognitionMatch, ScanBackend, SessionPoll,
};
use card_scanner::errors::{RecognitionError, SessionError};
use futures::FutureExt;
use futures::future::BoxFuture;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

pub fn card(id: &str, name: &str) -> RecognitionMatch {
    RecognitionMatch {
        card_id: id.to_string(),
        name: name.to_string(),
        finishes: vec!["nonfoil".to_string()],
        set: "tst".to_string(),
        set_name: "Test Set".to_string(),
        prices: CardPrices {
            usd: Some("1.00".to_string()),
            ..CardPrices::default()
        },
        image_uris: ImageUris::default(),
        collector_number: "001".to_string(),
    }
}

/// In-memory backend: fixed recognition answer, scripted session polls
pub struct FakeBackend {
    answer: Recognition,
    polls: Mutex<VecDeque<Result<SessionPoll, SessionError>>>,
    pub recognized: AtomicUsize,
    pub uploads: Mutex<Vec<(String, usize)>>,
    pub sessions_created: AtomicUsize,
    pub polled: Mutex<Vec<String>>,
}

impl FakeBackend {
    pub fn new(answer: Recognition) -> Self {
        Self {
            answer,
            polls: Mutex::new(VecDeque::new()),
            recognized: AtomicUsize::new(0),
            uploads: Mutex::new(Vec::new()),
            sessions_created: AtomicUsize::new(0),
            polled: Mutex::new(Vec::new()),
        }
    }

    pub fn with_polls(mut self, polls: Vec<Result<SessionPoll, SessionError>>) -> Self {
        self.polls = Mutex::new(polls.into());
        self
    }

    pub fn recognized(&self) -> usize {
        self.recognized.load(Ordering::SeqCst)
    }
}

impl ScanBackend for FakeBackend {
    fn recognize(&self, image: EncodedImage) -> BoxFuture<'_, Result<Recognition, RecognitionError>> {
        assert_eq!(image.mime, "image/jpeg");
        self.recognized.fetch_add(1, Ordering::SeqCst);
        let answer = self.answer.clone();
        async move { Ok(answer) }.boxed()
    }

    fn create_session(&self) -> BoxFuture<'_, Result<String, RecognitionError>> {
        let n = self.sessions_created.fetch_add(1, Ordering::SeqCst) + 1;
        async move { Ok(format!("session-{}", n)) }.boxed()
    }

    fn poll_session<'a>(&'a self, session_id: &'a str) -> BoxFuture<'a, Result<SessionPoll, SessionError>> {
        self.polled.lock().unwrap().push(session_id.to_string());
        let next = self
            .polls
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(SessionPoll::Pending));
        async move { next }.boxed()
    }

    fn submit_to_session<'a>(
        &'a self,
        session_id: &'a str,
        image: EncodedImage,
    ) -> BoxFuture<'a, Result<(), SessionError>> {
        self.uploads
            .lock()
            .unwrap()
            .push((session_id.to_string(), image.bytes.len()));
        async { Ok(()) }.boxed()
    }
}
