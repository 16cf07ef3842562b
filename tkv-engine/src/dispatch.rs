//! # Command Dispatcher
//!
//! Parse a request frame, route to the handler, and compose the response.
//!
//! ## Design Principles
//!
//! 1. **Decode Before Mutate**: Every argument (key, value, TTL) decodes
//!    at its required validity tier before any lock is taken, so a request
//!    that fails to parse leaves the keyspace untouched.
//! 2. **Errors Are Statuses**: Handlers return `KvResult<Response>`; a
//!    `KvError` becomes the response status and the connection stays up.
//! 3. **One Critical Section Per Command**: Handlers that touch both the
//!    keyspace and the TTL heap hold the keyspace guard across the heap
//!    call (keyspace before heap, globally), so the expirer never observes
//!    a write without its TTL registration.

use tracing::{debug, warn};

use tkv_common::codec;
use tkv_common::wire;
use tkv_common::{KvError, KvResult, Response, Value};

use crate::store::Store;

impl Store {
    /// Dispatches one framed request and returns the response.
    ///
    /// The frame layout is a `u16` LE substring count followed by
    /// `u16`-LE-length-prefixed substrings: command first, then raw
    /// still-encoded arguments.
    pub fn dispatch(&self, frame: &[u8]) -> Response {
        let parts = match wire::split_frame(frame) {
            Ok(parts) => parts,
            Err(err) => {
                warn!("misformed request frame");
                return err.into();
            }
        };
        let (command, args) = match parts.split_first() {
            Some((command, args)) => (*command, args),
            None => {
                warn!("request frame carried no command");
                return KvError::Client.into();
            }
        };

        let result = match command {
            b"GET" => self.do_get(args),
            b"PUT" => self.do_put(args),
            b"DEL" => self.do_del(args),
            b"QUEUE" => self.do_queue(args),
            b"PUSH" => self.do_push(args),
            b"POP" => self.do_pop(args),
            b"TTL" => self.do_ttl(args),
            _ => {
                warn!(
                    command = %String::from_utf8_lossy(command),
                    "unrecognized command"
                );
                Err(KvError::BadCmd)
            }
        };

        result.unwrap_or_else(Response::from)
    }

    fn do_get(&self, args: &[&[u8]]) -> KvResult<Response> {
        if args.len() != 1 {
            return Err(KvError::BadArgs);
        }
        let key = codec::decode_hashable(args[0])?;

        let guard = self.keyspace.lock();
        let value = guard.get(&key).ok_or(KvError::BadKey)?;
        if matches!(value, Value::Deque(_)) {
            // Deque contents are read via POP; the wire has no deque symbol.
            return Err(KvError::BadOp);
        }
        let payload = codec::encode_any(value)?;
        Ok(Response::with_payload(payload))
    }

    fn do_put(&self, args: &[&[u8]]) -> KvResult<Response> {
        if args.len() < 2 || args.len() > 3 {
            return Err(KvError::BadArgs);
        }
        let key = codec::decode_hashable(args[0])?;
        let value = codec::decode_any(args[1])?;
        let ttl = match args.get(2) {
            Some(raw) => Some(codec::decode_ttl(raw)?),
            None => None,
        };

        let mut guard = self.keyspace.lock();
        let existed = guard.set(key.clone(), value);
        match ttl {
            Some(deadline) => self.ttl.put(key, deadline),
            None => {
                self.ttl.invalidate(&key);
            }
        }
        drop(guard);

        debug!(existed, "put stored value");
        Ok(Response::ok())
    }

    fn do_del(&self, args: &[&[u8]]) -> KvResult<Response> {
        if args.len() != 1 {
            return Err(KvError::BadArgs);
        }
        let key = codec::decode_hashable(args[0])?;

        let mut guard = self.keyspace.lock();
        let existed = guard.delete(&key);
        if existed {
            // Keep the TTL index a subset of the keyspace.
            self.ttl.invalidate(&key);
        }
        drop(guard);

        if existed {
            Ok(Response::ok())
        } else {
            debug!("del on missing key");
            Err(KvError::BadKey)
        }
    }

    fn do_queue(&self, args: &[&[u8]]) -> KvResult<Response> {
        if args.is_empty() || args.len() > 2 {
            return Err(KvError::BadArgs);
        }
        let key = codec::decode_hashable(args[0])?;
        let ttl = match args.get(1) {
            Some(raw) => Some(codec::decode_ttl(raw)?),
            None => None,
        };

        let mut guard = self.keyspace.lock();
        guard.put_empty_deque(key.clone());
        match ttl {
            Some(deadline) => self.ttl.put(key, deadline),
            None => {
                self.ttl.invalidate(&key);
            }
        }
        drop(guard);

        Ok(Response::ok())
    }

    fn do_push(&self, args: &[&[u8]]) -> KvResult<Response> {
        if args.len() != 2 {
            return Err(KvError::BadArgs);
        }
        let key = codec::decode_hashable(args[0])?;
        let value = codec::decode_collectable(args[1])?;

        self.keyspace.with_deque_mut(&key, |deque| {
            deque.push_back(value);
            Ok(())
        })?;
        Ok(Response::ok())
    }

    fn do_pop(&self, args: &[&[u8]]) -> KvResult<Response> {
        if args.len() != 1 {
            return Err(KvError::BadArgs);
        }
        let key = codec::decode_hashable(args[0])?;

        let payload = self.keyspace.with_deque_mut(&key, |deque| {
            let popped = deque.pop_front().ok_or(KvError::BadIx)?;
            codec::encode_any(&popped)
        })?;
        Ok(Response::with_payload(payload))
    }

    fn do_ttl(&self, args: &[&[u8]]) -> KvResult<Response> {
        if args.is_empty() || args.len() > 2 {
            return Err(KvError::BadArgs);
        }
        let key = codec::decode_hashable(args[0])?;
        let ttl = match args.get(1) {
            Some(raw) => Some(codec::decode_ttl(raw)?),
            None => None,
        };

        let guard = self.keyspace.lock();
        if !guard.contains(&key) {
            return Err(KvError::BadKey);
        }
        match ttl {
            Some(deadline) => self.ttl.put(key, deadline),
            None => {
                self.ttl.invalidate(&key);
            }
        }
        drop(guard);

        Ok(Response::ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tkv_common::STATUS_OK;

    fn store() -> Store {
        Store::new()
    }

    fn frame(parts: &[&[u8]]) -> Vec<u8> {
        wire::build_frame(parts).unwrap()
    }

    fn enc(value: &Value) -> Vec<u8> {
        codec::encode_any(value).unwrap()
    }

    fn str_val(text: &str) -> Value {
        Value::Str(text.to_string())
    }

    fn send(store: &Store, parts: &[&[u8]]) -> Response {
        store.dispatch(&frame(parts))
    }

    fn status_of(store: &Store, parts: &[&[u8]]) -> u8 {
        send(store, parts).status
    }

    fn future_ttl() -> Vec<u8> {
        let when = (chrono::Utc::now() + chrono::Duration::hours(1)).fixed_offset();
        enc(&Value::Datetime(when))
    }

    #[test]
    fn put_then_get_roundtrips_a_string() {
        let store = store();
        let key = enc(&str_val("k"));
        let value = enc(&str_val("hello"));

        let resp = send(&store, &[b"PUT", &key, &value]);
        assert_eq!(resp.status, STATUS_OK);
        assert_eq!(resp.payload, None);

        let resp = send(&store, &[b"GET", &key]);
        assert_eq!(resp.status, STATUS_OK);
        assert_eq!(resp.payload, Some(b"\"hello".to_vec()));
    }

    #[test]
    fn get_missing_key_is_bad_key() {
        let store = store();
        let key = enc(&str_val("absent"));
        assert_eq!(status_of(&store, &[b"GET", &key]), KvError::BadKey.code());
    }

    #[test]
    fn del_reports_existence() {
        let store = store();
        let key = enc(&str_val("k"));
        let value = enc(&Value::Int(1));

        assert_eq!(status_of(&store, &[b"DEL", &key]), KvError::BadKey.code());
        assert_eq!(status_of(&store, &[b"PUT", &key, &value]), STATUS_OK);
        assert_eq!(status_of(&store, &[b"DEL", &key]), STATUS_OK);
        assert_eq!(status_of(&store, &[b"GET", &key]), KvError::BadKey.code());
    }

    #[test]
    fn queue_push_pop_roundtrip() {
        let store = store();
        let key = enc(&str_val("q"));
        let first = enc(&Value::Int(42));
        let second = enc(&Value::Float(3.25));

        assert_eq!(status_of(&store, &[b"QUEUE", &key]), STATUS_OK);
        assert_eq!(status_of(&store, &[b"PUSH", &key, &first]), STATUS_OK);
        assert_eq!(status_of(&store, &[b"PUSH", &key, &second]), STATUS_OK);

        let resp = send(&store, &[b"POP", &key]);
        assert_eq!(resp.status, STATUS_OK);
        assert_eq!(resp.payload, Some(b"#42".to_vec()));

        let resp = send(&store, &[b"POP", &key]);
        assert_eq!(resp.status, STATUS_OK);
        assert_eq!(resp.payload, Some(b"%3.25".to_vec()));

        // Popping the now-empty deque is an index error.
        let resp = send(&store, &[b"POP", &key]);
        assert_eq!(resp.status, KvError::BadIx.code());
        assert_eq!(resp.payload, None);
    }

    #[test]
    fn push_rejects_nested_collections() {
        let store = store();
        let key = enc(&str_val("q"));
        let list = enc(&Value::List(vec![Value::Int(1)]));

        assert_eq!(status_of(&store, &[b"QUEUE", &key]), STATUS_OK);
        assert_eq!(
            status_of(&store, &[b"PUSH", &key, &list]),
            KvError::BadCollection.code()
        );
    }

    #[test]
    fn push_and_pop_check_value_shape() {
        let store = store();
        let scalar_key = enc(&str_val("scalar"));
        let missing_key = enc(&str_val("missing"));
        let item = enc(&Value::Int(1));

        assert_eq!(status_of(&store, &[b"PUT", &scalar_key, &item]), STATUS_OK);
        assert_eq!(
            status_of(&store, &[b"PUSH", &scalar_key, &item]),
            KvError::BadOp.code()
        );
        assert_eq!(
            status_of(&store, &[b"POP", &scalar_key]),
            KvError::BadOp.code()
        );
        assert_eq!(
            status_of(&store, &[b"PUSH", &missing_key, &item]),
            KvError::BadKey.code()
        );
        assert_eq!(
            status_of(&store, &[b"POP", &missing_key]),
            KvError::BadKey.code()
        );
    }

    #[test]
    fn tuple_keys_work_and_unhashable_keys_fail() {
        let store = store();
        let tuple_key = enc(&Value::Tuple(vec![Value::Int(1), str_val("a")]));
        let value = enc(&Value::Int(7));

        assert_eq!(status_of(&store, &[b"PUT", &tuple_key, &value]), STATUS_OK);
        let resp = send(&store, &[b"GET", &tuple_key]);
        assert_eq!(resp.status, STATUS_OK);
        assert_eq!(resp.payload, Some(b"#7".to_vec()));

        // A tuple key containing a list cannot be produced by the encoder;
        // build the payload by hand to exercise the server-side rejection.
        let list_item = enc(&Value::List(vec![Value::Int(2)]));
        let mut bad_key = vec![b'('];
        bad_key.extend_from_slice(&2u16.to_le_bytes());
        bad_key.extend_from_slice(&2u16.to_le_bytes());
        bad_key.extend_from_slice(b"#1");
        bad_key.extend_from_slice(&u16::try_from(list_item.len()).unwrap().to_le_bytes());
        bad_key.extend_from_slice(&list_item);
        assert_eq!(
            status_of(&store, &[b"PUT", &bad_key, &value]),
            KvError::BadHash.code()
        );

        let bool_key = enc(&Value::Bool(true));
        assert_eq!(
            status_of(&store, &[b"GET", &bool_key]),
            KvError::BadHash.code()
        );
    }

    #[test]
    fn put_accepts_lists_and_datetimes_as_values() {
        let store = store();
        let key = enc(&str_val("k"));
        let list = Value::List(vec![Value::Int(1), Value::Bool(false)]);
        let encoded = enc(&list);

        assert_eq!(status_of(&store, &[b"PUT", &key, &encoded]), STATUS_OK);
        let resp = send(&store, &[b"GET", &key]);
        assert_eq!(resp.status, STATUS_OK);
        assert_eq!(resp.payload, Some(encoded));
    }

    #[test]
    fn get_on_a_deque_is_bad_op() {
        let store = store();
        let key = enc(&str_val("q"));
        assert_eq!(status_of(&store, &[b"QUEUE", &key]), STATUS_OK);
        assert_eq!(status_of(&store, &[b"GET", &key]), KvError::BadOp.code());
    }

    #[test]
    fn put_overwrites_a_deque_with_a_scalar() {
        let store = store();
        let key = enc(&str_val("q"));
        let value = enc(&Value::Int(5));

        assert_eq!(status_of(&store, &[b"QUEUE", &key]), STATUS_OK);
        assert_eq!(status_of(&store, &[b"PUT", &key, &value]), STATUS_OK);
        let resp = send(&store, &[b"GET", &key]);
        assert_eq!(resp.payload, Some(b"#5".to_vec()));
    }

    #[test]
    fn ttl_command_requires_an_existing_key() {
        let store = store();
        let key = enc(&str_val("k"));
        let ttl = future_ttl();

        assert_eq!(
            status_of(&store, &[b"TTL", &key, &ttl]),
            KvError::BadKey.code()
        );

        let value = enc(&Value::Int(1));
        assert_eq!(status_of(&store, &[b"PUT", &key, &value]), STATUS_OK);
        assert_eq!(status_of(&store, &[b"TTL", &key, &ttl]), STATUS_OK);
        assert_eq!(store.ttl.live_len(), 1);

        // TTL without a deadline retires the registration.
        assert_eq!(status_of(&store, &[b"TTL", &key]), STATUS_OK);
        assert_eq!(store.ttl.live_len(), 0);
    }

    #[test]
    fn put_with_ttl_registers_and_put_without_retires() {
        let store = store();
        let key = enc(&str_val("k"));
        let value = enc(&Value::Int(1));
        let ttl = future_ttl();

        assert_eq!(status_of(&store, &[b"PUT", &key, &value, &ttl]), STATUS_OK);
        assert_eq!(store.ttl.live_len(), 1);

        assert_eq!(status_of(&store, &[b"PUT", &key, &value]), STATUS_OK);
        assert_eq!(store.ttl.live_len(), 0);
    }

    #[test]
    fn queue_accepts_an_optional_ttl() {
        let store = store();
        let key = enc(&str_val("q"));
        let ttl = future_ttl();

        assert_eq!(status_of(&store, &[b"QUEUE", &key, &ttl]), STATUS_OK);
        assert_eq!(store.ttl.live_len(), 1);
    }

    #[test]
    fn del_retires_the_ttl_registration() {
        let store = store();
        let key = enc(&str_val("k"));
        let value = enc(&Value::Int(1));
        let ttl = future_ttl();

        assert_eq!(status_of(&store, &[b"PUT", &key, &value, &ttl]), STATUS_OK);
        assert_eq!(status_of(&store, &[b"DEL", &key]), STATUS_OK);
        assert_eq!(store.ttl.live_len(), 0);
    }

    #[test]
    fn ttl_argument_must_be_a_datetime() {
        let store = store();
        let key = enc(&str_val("k"));
        let value = enc(&Value::Int(1));
        let bogus = enc(&Value::Int(99));

        assert_eq!(
            status_of(&store, &[b"PUT", &key, &value, &bogus]),
            KvError::BadType.code()
        );
        // The failed request left the keyspace untouched.
        assert_eq!(status_of(&store, &[b"GET", &key]), KvError::BadKey.code());
    }

    #[test]
    fn arity_violations_are_bad_args() {
        let store = store();
        let key = enc(&str_val("k"));
        let value = enc(&Value::Int(1));

        assert_eq!(status_of(&store, &[b"GET"]), KvError::BadArgs.code());
        assert_eq!(
            status_of(&store, &[b"GET", &key, &value]),
            KvError::BadArgs.code()
        );
        assert_eq!(status_of(&store, &[b"PUT", &key]), KvError::BadArgs.code());
        assert_eq!(
            status_of(&store, &[b"PUT", &key, &value, &value, &value]),
            KvError::BadArgs.code()
        );
        assert_eq!(status_of(&store, &[b"DEL"]), KvError::BadArgs.code());
        assert_eq!(status_of(&store, &[b"QUEUE"]), KvError::BadArgs.code());
        assert_eq!(
            status_of(&store, &[b"PUSH", &key]),
            KvError::BadArgs.code()
        );
        assert_eq!(
            status_of(&store, &[b"POP", &key, &key]),
            KvError::BadArgs.code()
        );
        assert_eq!(status_of(&store, &[b"TTL"]), KvError::BadArgs.code());
    }

    #[test]
    fn unknown_command_is_bad_cmd() {
        let store = store();
        assert_eq!(status_of(&store, &[b"NOPE"]), KvError::BadCmd.code());
        // Dispatch is case-sensitive.
        assert_eq!(status_of(&store, &[b"get"]), KvError::BadCmd.code());
    }

    #[test]
    fn misformed_frames_are_client_errors() {
        let store = store();
        assert_eq!(store.dispatch(b"").status, KvError::Client.code());
        assert_eq!(store.dispatch(&[9, 0]).status, KvError::Client.code());

        let mut bad = frame(&[b"GET", b"\"k"]);
        bad.push(0);
        assert_eq!(store.dispatch(&bad).status, KvError::Client.code());

        // A zero-substring frame has no command.
        assert_eq!(store.dispatch(&[0, 0]).status, KvError::Client.code());
    }

    #[test]
    fn error_responses_never_carry_a_payload() {
        let store = store();
        let key = enc(&str_val("absent"));
        let resp = send(&store, &[b"GET", &key]);
        assert_eq!(resp.status, KvError::BadKey.code());
        assert_eq!(resp.payload, None);
    }
}
